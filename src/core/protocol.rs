/// Host Protocol Types
///
/// Serde types for the tool contract shared with the host runtime. Field names
/// follow the host's camelCase wire format (`inputSchema`, `isError`, `mimeType`).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Kind of a content item, used as the `type` tag on the wire.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Image,
    Resource,
}

/// Intended audience of a piece of content.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Assistant,
    User,
}

/// Audience and importance hints attached to content.
///
/// `priority` ranges from 0 (entirely optional) to 1 (effectively required).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TextAnnotation {
    pub audience: Vec<Role>,
    pub priority: f32,
}

/// Contents of an embedded resource, either text or base64 blob.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ResourceContents {
    Text {
        uri: String,
        text: String,
        #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
    Blob {
        uri: String,
        blob: String,
        #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
}

/// One item of a tool result.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentItem {
    Text {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        annotations: Option<TextAnnotation>,
    },
    Image {
        /// Base64-encoded image data
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        annotations: Option<TextAnnotation>,
    },
    Resource {
        resource: ResourceContents,
        #[serde(skip_serializing_if = "Option::is_none")]
        annotations: Option<TextAnnotation>,
    },
}

impl ContentItem {
    /// Plain text item without annotations.
    pub fn text(text: impl Into<String>) -> Self {
        ContentItem::Text {
            text: text.into(),
            annotations: None,
        }
    }

    pub fn content_type(&self) -> ContentType {
        match self {
            ContentItem::Text { .. } => ContentType::Text,
            ContentItem::Image { .. } => ContentType::Image,
            ContentItem::Resource { .. } => ContentType::Resource,
        }
    }

    /// Text payload, if this is a text item.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentItem::Text { text, .. } => Some(text),
            _ => None,
        }
    }
}

/// Metadata describing one tool: its name, purpose and JSON input schema.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ToolDescription {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Result of the `describe` entry point.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ListToolsResult {
    pub tools: Vec<ToolDescription>,
}

/// Name and arguments of a tool invocation.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Params {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Map<String, Value>>,
}

/// A tool invocation as delivered by the host.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct CallToolRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    pub params: Params,
}

/// The tool's response to a call.
///
/// Errors raised by the tool itself are reported here with `is_error` set so the
/// calling model can read them. Failures to find or reach the tool are protocol
/// errors and never take this shape.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CallToolResult {
    pub content: Vec<ContentItem>,
    #[serde(rename = "isError", default, skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl CallToolResult {
    /// Successful result carrying a single text item. `isError` stays unset.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentItem::text(text)],
            is_error: None,
        }
    }

    /// Tool-level error carrying a single text item.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ContentItem::text(message)],
            is_error: Some(true),
        }
    }

    pub fn is_error(&self) -> bool {
        self.is_error.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_result_omits_is_error() {
        let value = serde_json::to_value(CallToolResult::text("90.000000")).unwrap();
        assert_eq!(
            value,
            json!({ "content": [{ "type": "text", "text": "90.000000" }] })
        );
    }

    #[test]
    fn error_result_sets_is_error() {
        let value = serde_json::to_value(CallToolResult::error("No arguments")).unwrap();
        assert_eq!(value["isError"], json!(true));
        assert_eq!(value["content"][0]["text"], json!("No arguments"));
    }

    #[test]
    fn request_without_arguments_parses() {
        let req: CallToolRequest =
            serde_json::from_value(json!({ "params": { "name": "currency-converter" } })).unwrap();
        assert_eq!(req.params.name, "currency-converter");
        assert!(req.params.arguments.is_none());
        assert!(req.method.is_none());
    }

    #[test]
    fn image_and_resource_items_carry_their_tags() {
        let image = ContentItem::Image {
            data: "aGVsbG8=".into(),
            mime_type: "image/png".into(),
            annotations: Some(TextAnnotation {
                audience: vec![Role::User],
                priority: 0.5,
            }),
        };
        let value = serde_json::to_value(&image).unwrap();
        assert_eq!(value["type"], json!("image"));
        assert_eq!(value["mimeType"], json!("image/png"));
        assert_eq!(value["annotations"]["audience"], json!(["user"]));

        let resource: ContentItem = serde_json::from_value(json!({
            "type": "resource",
            "resource": { "uri": "file:///rates.json", "blob": "e30=" }
        }))
        .unwrap();
        assert_eq!(resource.content_type(), ContentType::Resource);
        assert!(matches!(
            resource,
            ContentItem::Resource { resource: ResourceContents::Blob { .. }, .. }
        ));
    }
}
