//! Website page content blocks
//!
//! A page body is an ordered array of blocks. Each block has a client-chosen
//! `id`, a `type` tag and a `content` record whose shape depends on the type:
//!
//! ```json
//! [
//!   { "id": "b1", "type": "hero", "content": { "title": "Welcome home" } },
//!   { "id": "b2", "type": "events", "content": { "heading": "This week", "limit": 3 } }
//! ]
//! ```
//!
//! Unknown fields inside `content` are ignored and every field is optional,
//! so older pages keep loading as the editor grows.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Most blocks a single page may hold
pub const MAX_BLOCKS_PER_PAGE: usize = 100;

/// Most images in one gallery block
pub const MAX_GALLERY_IMAGES: usize = 50;

/// Largest `limit` an events block may ask for
pub const MAX_EVENTS_PER_BLOCK: u32 = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub id: String,
    #[serde(flatten)]
    pub content: BlockContent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "lowercase")]
pub enum BlockContent {
    Hero(HeroBlock),
    Text(TextBlock),
    Image(ImageBlock),
    Events(EventsBlock),
    Donation(DonationBlock),
    Gallery(GalleryBlock),
    Video(VideoBlock),
    Contact(ContactBlock),
}

impl BlockContent {
    pub fn type_name(&self) -> &'static str {
        match self {
            BlockContent::Hero(_) => "hero",
            BlockContent::Text(_) => "text",
            BlockContent::Image(_) => "image",
            BlockContent::Events(_) => "events",
            BlockContent::Donation(_) => "donation",
            BlockContent::Gallery(_) => "gallery",
            BlockContent::Video(_) => "video",
            BlockContent::Contact(_) => "contact",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeroBlock {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub background_image_url: Option<String>,
    pub cta_label: Option<String>,
    pub cta_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextBlock {
    pub heading: Option<String>,
    pub body: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageBlock {
    pub url: Option<String>,
    pub alt: Option<String>,
    pub caption: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsBlock {
    pub heading: Option<String>,
    pub limit: u32,
    pub category: Option<String>,
}

impl Default for EventsBlock {
    fn default() -> Self {
        Self {
            heading: None,
            limit: 5,
            category: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DonationBlock {
    pub heading: Option<String>,
    pub message: Option<String>,
    pub fund_id: Option<Uuid>,
    pub button_label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GalleryBlock {
    pub heading: Option<String>,
    pub images: Vec<GalleryImage>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GalleryImage {
    pub url: String,
    pub alt: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoBlock {
    pub url: Option<String>,
    pub title: Option<String>,
    pub caption: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactBlock {
    pub heading: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub show_map: bool,
    pub show_prayer_form: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlockError {
    #[error("a page may hold at most {max} blocks")]
    TooManyBlocks { max: usize },

    #[error("block {index} has an empty id")]
    EmptyId { index: usize },

    #[error("block id '{0}' is used more than once")]
    DuplicateId(String),

    #[error("{kind} block '{id}' needs a url")]
    MissingUrl { id: String, kind: &'static str },

    #[error("gallery block '{id}' has more than {max} images")]
    TooManyImages { id: String, max: usize },

    #[error("events block '{id}' limit must be between 1 and {max}")]
    EventLimit { id: String, max: u32 },
}

fn blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

/// Checks a page body before it is stored
///
/// Block ids must be non-empty and unique within the page. Image and video
/// blocks need a url, gallery images need urls, and events blocks ask for
/// between 1 and 20 events.
pub fn validate_blocks(blocks: &[ContentBlock]) -> Result<(), BlockError> {
    if blocks.len() > MAX_BLOCKS_PER_PAGE {
        return Err(BlockError::TooManyBlocks {
            max: MAX_BLOCKS_PER_PAGE,
        });
    }

    let mut seen = HashSet::with_capacity(blocks.len());

    for (index, block) in blocks.iter().enumerate() {
        let id = block.id.trim();
        if id.is_empty() {
            return Err(BlockError::EmptyId { index });
        }
        if !seen.insert(id) {
            return Err(BlockError::DuplicateId(id.to_string()));
        }

        match &block.content {
            BlockContent::Image(image) if blank(&image.url) => {
                return Err(BlockError::MissingUrl {
                    id: id.to_string(),
                    kind: "image",
                });
            }
            BlockContent::Video(video) if blank(&video.url) => {
                return Err(BlockError::MissingUrl {
                    id: id.to_string(),
                    kind: "video",
                });
            }
            BlockContent::Gallery(gallery) => {
                if gallery.images.len() > MAX_GALLERY_IMAGES {
                    return Err(BlockError::TooManyImages {
                        id: id.to_string(),
                        max: MAX_GALLERY_IMAGES,
                    });
                }
                if gallery.images.iter().any(|image| image.url.trim().is_empty()) {
                    return Err(BlockError::MissingUrl {
                        id: id.to_string(),
                        kind: "gallery",
                    });
                }
            }
            BlockContent::Events(events)
                if events.limit == 0 || events.limit > MAX_EVENTS_PER_BLOCK =>
            {
                return Err(BlockError::EventLimit {
                    id: id.to_string(),
                    max: MAX_EVENTS_PER_BLOCK,
                });
            }
            _ => {}
        }
    }

    Ok(())
}

/// Largest events `limit` across the page, if it has any events block
pub fn events_limit(blocks: &[ContentBlock]) -> Option<u32> {
    blocks
        .iter()
        .filter_map(|block| match &block.content {
            BlockContent::Events(events) => Some(events.limit),
            _ => None,
        })
        .max()
}

/// True when any block is a donation block
pub fn has_donation_block(blocks: &[ContentBlock]) -> bool {
    blocks
        .iter()
        .any(|block| matches!(block.content, BlockContent::Donation(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> Vec<ContentBlock> {
        serde_json::from_value(value).expect("blocks should parse")
    }

    #[test]
    fn test_blocks_parse_tagged_json() {
        let blocks = parse(json!([
            { "id": "a", "type": "hero", "content": { "title": "Welcome", "cta_url": "/visit" } },
            { "id": "b", "type": "text", "content": { "body": "We gather at 10am." } },
            { "id": "c", "type": "events", "content": { "limit": 3 } },
            { "id": "d", "type": "contact", "content": {} }
        ]));

        assert_eq!(blocks.len(), 4);
        assert_eq!(blocks[0].content.type_name(), "hero");
        match &blocks[0].content {
            BlockContent::Hero(hero) => assert_eq!(hero.title.as_deref(), Some("Welcome")),
            other => panic!("unexpected block {:?}", other),
        }
        match &blocks[2].content {
            BlockContent::Events(events) => {
                assert_eq!(events.limit, 3);
                assert!(events.heading.is_none());
            }
            other => panic!("unexpected block {:?}", other),
        }
    }

    #[test]
    fn test_blocks_serialize_with_type_and_content() {
        let block = ContentBlock {
            id: "x".to_string(),
            content: BlockContent::Image(ImageBlock {
                url: Some("https://cdn.example.org/a.jpg".to_string()),
                ..Default::default()
            }),
        };

        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(value["id"], "x");
        assert_eq!(value["type"], "image");
        assert_eq!(value["content"]["url"], "https://cdn.example.org/a.jpg");
    }

    #[test]
    fn test_unknown_block_type_rejected() {
        let result: Result<Vec<ContentBlock>, _> =
            serde_json::from_value(json!([{ "id": "a", "type": "carousel", "content": {} }]));
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_content_fields_ignored() {
        let blocks = parse(json!([
            { "id": "a", "type": "text", "content": { "body": "hi", "font": "serif" } }
        ]));
        assert!(validate_blocks(&blocks).is_ok());
    }

    #[test]
    fn test_duplicate_block_ids_rejected() {
        let blocks = parse(json!([
            { "id": "same", "type": "text", "content": {} },
            { "id": "same", "type": "hero", "content": {} }
        ]));
        assert_eq!(
            validate_blocks(&blocks),
            Err(BlockError::DuplicateId("same".to_string()))
        );
    }

    #[test]
    fn test_empty_block_id_rejected() {
        let blocks = parse(json!([{ "id": "  ", "type": "text", "content": {} }]));
        assert_eq!(validate_blocks(&blocks), Err(BlockError::EmptyId { index: 0 }));
    }

    #[test]
    fn test_media_blocks_need_urls() {
        let blocks = parse(json!([{ "id": "img", "type": "image", "content": { "alt": "x" } }]));
        assert!(matches!(
            validate_blocks(&blocks),
            Err(BlockError::MissingUrl { kind: "image", .. })
        ));

        let blocks = parse(json!([{ "id": "v", "type": "video", "content": { "url": " " } }]));
        assert!(matches!(
            validate_blocks(&blocks),
            Err(BlockError::MissingUrl { kind: "video", .. })
        ));
    }

    #[test]
    fn test_events_limit_bounds() {
        let blocks = parse(json!([{ "id": "e", "type": "events", "content": { "limit": 0 } }]));
        assert!(validate_blocks(&blocks).is_err());

        let blocks = parse(json!([{ "id": "e", "type": "events", "content": { "limit": 21 } }]));
        assert!(validate_blocks(&blocks).is_err());
    }

    #[test]
    fn test_events_limit_and_donation_detection() {
        let blocks = parse(json!([
            { "id": "a", "type": "events", "content": { "limit": 3 } },
            { "id": "b", "type": "events", "content": {} },
            { "id": "c", "type": "donation", "content": { "heading": "Give" } }
        ]));
        assert_eq!(events_limit(&blocks), Some(5));
        assert!(has_donation_block(&blocks));
        assert_eq!(events_limit(&[]), None);
        assert!(!has_donation_block(&[]));
    }
}
