//! Default configuration template with every option documented.

/// Generate the documented config template for the given port.
pub fn default_config_template(port: u16) -> String {
    format!(
        r##"# Switchboard Configuration
# =========================
# Uncomment and modify settings as needed. Changes require a restart.
#
# Environment variable substitution is supported: ${{ENV_VAR}}

[server]
bind = "127.0.0.1"          # "0.0.0.0" to listen on all interfaces
port = {port}

[sessions]
# auth_dir = "/var/lib/switchboard/sessions"   # default: <data dir>/sessions
init_timeout_secs = 60      # initializing -> timeout after this long without progress
restore_on_startup = false  # recreate sessions for existing auth directories

# Legacy names kept working after a session was renamed. Only used when the
# name does not match a registered id directly or after normalization.
[sessions.aliases]
# "Support Desk" = "support_at_example_dot_com"

[dispatch]
default_country_code = "91" # prefixed to bare national numbers
national_number_length = 10
address_suffix = "@c.us"
send_timeout_secs = 60

[media]
max_bytes = 52428800        # 50 MiB
fetch_timeout_secs = 30

[whatsapp]
# sidecar_dir = "/opt/switchboard/sidecar/whatsapp-web"
port = 18802
auto_start = true
request_timeout_secs = 30
"##
    )
}
