use std::collections::BTreeMap;

#[cfg(feature = "gstreamer")]
use gstreamer as gst;

/// Tag name under which the negotiated video size is stored.
pub const RESOLUTION: &str = "resolution";
/// Tag name under which the negotiated pixel aspect ratio is stored.
pub const PIXEL_ASPECT_RATIO: &str = "pixel-aspect-ratio";
/// Tag name carrying a stream's ISO language code.
pub const LANGUAGE_CODE: &str = "language-code";

/// A single tag value.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Str(String),
    Int(i64),
    UInt(u64),
    Double(f64),
    Bool(bool),
    DateTime(String),
    Size { width: u32, height: u32 },
    Fraction { numer: i32, denom: i32 },
}

impl TagValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TagValue::Str(s) | TagValue::DateTime(s) => Some(s),
            _ => None,
        }
    }
}

/// Negotiated video geometry read from the converter's caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VideoResolution {
    pub width: u32,
    pub height: u32,
    /// Pixel aspect ratio as `(numer, denom)`, when the caps carry one.
    pub pixel_aspect_ratio: Option<(i32, i32)>,
}

/// Accumulated media tags keyed by tag name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TagMap(BTreeMap<String, TagValue>);

impl TagMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&TagValue> {
        self.0.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: TagValue) -> Option<TagValue> {
        self.0.insert(name.into(), value)
    }

    pub fn remove(&mut self, name: &str) -> Option<TagValue> {
        self.0.remove(name)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TagValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Merges `other` into this map; values from `other` win.
    pub fn merge(&mut self, other: TagMap) {
        self.0.extend(other.0);
    }

    pub fn language(&self) -> Option<&str> {
        self.get(LANGUAGE_CODE).and_then(TagValue::as_str)
    }

    pub fn resolution(&self) -> Option<(u32, u32)> {
        match self.get(RESOLUTION) {
            Some(TagValue::Size { width, height }) => Some((*width, *height)),
            _ => None,
        }
    }

    pub fn pixel_aspect_ratio(&self) -> Option<(i32, i32)> {
        match self.get(PIXEL_ASPECT_RATIO) {
            Some(TagValue::Fraction { numer, denom }) => Some((*numer, *denom)),
            _ => None,
        }
    }

    /// Replaces the resolution tags with `resolution`.
    ///
    /// Returns `true` if the stored tags changed.
    pub fn set_resolution(&mut self, resolution: Option<VideoResolution>) -> bool {
        let size = resolution
            .filter(|r| r.width > 0 && r.height > 0)
            .map(|r| (r.width, r.height));
        let aspect = size
            .and(resolution)
            .and_then(|r| r.pixel_aspect_ratio)
            .filter(|&(_, denom)| denom > 0);

        if self.resolution() == size && self.pixel_aspect_ratio() == aspect {
            return false;
        }

        match size {
            Some((width, height)) => {
                self.insert(RESOLUTION, TagValue::Size { width, height });
            }
            None => {
                self.remove(RESOLUTION);
            }
        }
        match aspect {
            Some((numer, denom)) => {
                self.insert(PIXEL_ASPECT_RATIO, TagValue::Fraction { numer, denom });
            }
            None => {
                self.remove(PIXEL_ASPECT_RATIO);
            }
        }
        true
    }
}

impl FromIterator<(String, TagValue)> for TagMap {
    fn from_iter<T: IntoIterator<Item = (String, TagValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(feature = "gstreamer")]
impl From<&gst::TagListRef> for TagMap {
    fn from(tags: &gst::TagListRef) -> Self {
        tags.iter()
            .filter_map(|(name, value)| {
                let value = if let Ok(s) = value.get::<String>() {
                    TagValue::Str(s)
                } else if let Ok(v) = value.get::<u32>() {
                    TagValue::UInt(v.into())
                } else if let Ok(v) = value.get::<u64>() {
                    TagValue::UInt(v)
                } else if let Ok(v) = value.get::<i32>() {
                    TagValue::Int(v.into())
                } else if let Ok(v) = value.get::<i64>() {
                    TagValue::Int(v)
                } else if let Ok(v) = value.get::<f64>() {
                    TagValue::Double(v)
                } else if let Ok(v) = value.get::<bool>() {
                    TagValue::Bool(v)
                } else if let Ok(v) = value.get::<gst::DateTime>() {
                    TagValue::DateTime(v.to_iso8601_string().ok()?.to_string())
                } else {
                    log::trace!("skipping tag {name} of type {}", value.type_());
                    return None;
                };
                Some((name.to_string(), value))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_overwrites_earlier_values() {
        let mut tags = TagMap::new();
        tags.insert("title", TagValue::Str("first".into()));
        tags.insert("bitrate", TagValue::UInt(128));

        let update: TagMap = [("title".to_string(), TagValue::Str("second".into()))]
            .into_iter()
            .collect();
        tags.merge(update);

        assert_eq!(tags.get("title"), Some(&TagValue::Str("second".into())));
        assert_eq!(tags.get("bitrate"), Some(&TagValue::UInt(128)));
    }

    #[test]
    fn resolution_without_size_drops_aspect_ratio() {
        let mut tags = TagMap::new();
        assert!(tags.set_resolution(Some(VideoResolution {
            width: 1920,
            height: 1080,
            pixel_aspect_ratio: Some((1, 1)),
        })));
        assert_eq!(tags.resolution(), Some((1920, 1080)));
        assert_eq!(tags.pixel_aspect_ratio(), Some((1, 1)));

        assert!(!tags.set_resolution(Some(VideoResolution {
            width: 1920,
            height: 1080,
            pixel_aspect_ratio: Some((1, 1)),
        })));

        assert!(tags.set_resolution(Some(VideoResolution {
            width: 0,
            height: 0,
            pixel_aspect_ratio: Some((4, 3)),
        })));
        assert!(tags.is_empty());
    }
}
