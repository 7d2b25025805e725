//! What the caller wants delivered.

use serde::Deserialize;

use crate::error::{Error, Result};

/// Loosely-typed request fields; which ones are required depends on the
/// message type.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentFields {
    pub message: Option<String>,
    pub file_url: Option<String>,
    pub caption: Option<String>,
    pub link: Option<String>,
}

/// A validated message intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageIntent {
    Text {
        message: String,
    },
    Image {
        file_url: String,
        caption: Option<String>,
    },
    Document {
        file_url: String,
        caption: Option<String>,
    },
    /// Delivered as a voice note.
    Audio {
        file_url: String,
    },
    Video {
        file_url: String,
        caption: Option<String>,
    },
    /// Text with link preview enabled.
    Link {
        message: String,
        link: String,
    },
}

impl MessageIntent {
    pub fn text(message: impl Into<String>) -> Self {
        Self::Text {
            message: message.into(),
        }
    }

    /// Validate `fields` against the requirements of message type `kind`.
    pub fn parse(kind: &str, fields: IntentFields) -> Result<Self> {
        let IntentFields {
            message,
            file_url,
            caption,
            link,
        } = fields;
        let caption = non_blank(caption);

        let intent = match kind {
            "text" => Self::Text {
                message: required(message, "message", kind)?,
            },
            "image" => Self::Image {
                file_url: required(file_url, "fileUrl", kind)?,
                caption,
            },
            "document" => Self::Document {
                file_url: required(file_url, "fileUrl", kind)?,
                caption,
            },
            "audio" => Self::Audio {
                file_url: required(file_url, "fileUrl", kind)?,
            },
            "video" => Self::Video {
                file_url: required(file_url, "fileUrl", kind)?,
                caption,
            },
            "link" => Self::Link {
                message: required(message, "message", kind)?,
                link: required(link, "link", kind)?,
            },
            other => {
                return Err(Error::UnsupportedType {
                    kind: other.to_string(),
                });
            },
        };
        Ok(intent)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Image { .. } => "image",
            Self::Document { .. } => "document",
            Self::Audio { .. } => "audio",
            Self::Video { .. } => "video",
            Self::Link { .. } => "link",
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn required(value: Option<String>, field: &'static str, kind: &str) -> Result<String> {
    non_blank(value).ok_or_else(|| Error::missing_field(field, kind))
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    fn fields(json: serde_json::Value) -> IntentFields {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn parses_each_supported_type() {
        let url = "https://cdn.example.com/a.png";
        assert_eq!(
            MessageIntent::parse("text", fields(serde_json::json!({"message": "hi"}))).unwrap(),
            MessageIntent::text("hi")
        );
        assert_eq!(
            MessageIntent::parse(
                "image",
                fields(serde_json::json!({"fileUrl": url, "caption": "look"}))
            )
            .unwrap(),
            MessageIntent::Image {
                file_url: url.into(),
                caption: Some("look".into())
            }
        );
        assert_eq!(
            MessageIntent::parse("audio", fields(serde_json::json!({"fileUrl": url}))).unwrap(),
            MessageIntent::Audio {
                file_url: url.into()
            }
        );
        assert_eq!(
            MessageIntent::parse(
                "link",
                fields(serde_json::json!({"message": "see", "link": "https://example.com"}))
            )
            .unwrap(),
            MessageIntent::Link {
                message: "see".into(),
                link: "https://example.com".into()
            }
        );
    }

    #[test]
    fn blank_caption_is_dropped() {
        let intent = MessageIntent::parse(
            "video",
            fields(serde_json::json!({"fileUrl": "https://x/v.mp4", "caption": "  "})),
        )
        .unwrap();
        assert_eq!(intent, MessageIntent::Video {
            file_url: "https://x/v.mp4".into(),
            caption: None
        });
    }

    #[test]
    fn unsupported_type_names_the_type() {
        let err = MessageIntent::parse("sticker", IntentFields::default()).unwrap_err();
        assert_eq!(err.to_string(), "unsupported message type: sticker");
    }

    #[rstest]
    #[case("text", serde_json::json!({}), "message")]
    #[case("text", serde_json::json!({"message": "   "}), "message")]
    #[case("image", serde_json::json!({"caption": "c"}), "fileUrl")]
    #[case("document", serde_json::json!({}), "fileUrl")]
    #[case("link", serde_json::json!({"message": "m"}), "link")]
    #[case("link", serde_json::json!({"link": "https://x"}), "message")]
    fn missing_fields_are_named(
        #[case] kind: &str,
        #[case] json: serde_json::Value,
        #[case] field: &str,
    ) {
        match MessageIntent::parse(kind, fields(json)).unwrap_err() {
            Error::MissingField { field: f, .. } => assert_eq!(f, field),
            other => panic!("unexpected error: {other}"),
        }
    }
}
