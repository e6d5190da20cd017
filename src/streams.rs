use crate::tags::{TagMap, VideoResolution};

/// Kind of elementary stream exposed by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StreamType {
    Audio,
    Video,
    Subtitle,
}

impl StreamType {
    /// Flat index order: audio streams first, then video, then subtitles.
    pub const ALL: [StreamType; 3] = [StreamType::Audio, StreamType::Video, StreamType::Subtitle];

    fn slot(self) -> usize {
        match self {
            StreamType::Audio => 0,
            StreamType::Video => 1,
            StreamType::Subtitle => 2,
        }
    }
}

/// Metadata for one stream of the current media.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamDescriptor {
    pub stream_type: StreamType,
    /// Index within streams of the same type.
    pub index: usize,
    pub language: Option<String>,
    pub resolution: Option<VideoResolution>,
    pub tags: TagMap,
}

/// Streams of the current media, laid out in a single flat index space.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StreamInventory {
    counts: [usize; 3],
    streams: Vec<StreamDescriptor>,
}

impl StreamInventory {
    /// Builds the inventory from per-type counts, asking `tags` for each stream's tags.
    pub fn build<F>(counts: impl Fn(StreamType) -> usize, mut tags: F) -> Self
    where
        F: FnMut(StreamType, usize) -> Option<TagMap>,
    {
        let mut inventory = Self::default();
        for stream_type in StreamType::ALL {
            let count = counts(stream_type);
            inventory.counts[stream_type.slot()] = count;
            for index in 0..count {
                let tags = tags(stream_type, index).unwrap_or_default();
                inventory.streams.push(StreamDescriptor {
                    stream_type,
                    index,
                    language: tags.language().map(str::to_owned),
                    resolution: None,
                    tags,
                });
            }
        }
        inventory
    }

    pub fn count(&self, stream_type: StreamType) -> usize {
        self.counts[stream_type.slot()]
    }

    /// First flat index used by streams of `stream_type`.
    pub fn offset(&self, stream_type: StreamType) -> usize {
        StreamType::ALL
            .iter()
            .take_while(|&&t| t != stream_type)
            .map(|&t| self.count(t))
            .sum()
    }

    /// Maps a per-type index to the flat index space.
    pub fn to_flat(&self, stream_type: StreamType, index: usize) -> usize {
        index + self.offset(stream_type)
    }

    /// Maps a flat index back to a per-type index.
    ///
    /// Returns `None` if `flat` does not address a stream of `stream_type`.
    pub fn to_native(&self, stream_type: StreamType, flat: usize) -> Option<usize> {
        let index = flat.checked_sub(self.offset(stream_type))?;
        (index < self.count(stream_type)).then_some(index)
    }

    pub fn streams(&self) -> &[StreamDescriptor] {
        &self.streams
    }

    pub fn get(&self, flat: usize) -> Option<&StreamDescriptor> {
        self.streams.get(flat)
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn has_audio(&self) -> bool {
        self.count(StreamType::Audio) > 0
    }

    pub fn has_video(&self) -> bool {
        self.count(StreamType::Video) > 0
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Records the negotiated resolution on the video stream at `index`.
    pub fn set_video_resolution(&mut self, index: usize, resolution: Option<VideoResolution>) {
        let flat = self.to_flat(StreamType::Video, index);
        if let Some(stream) = self
            .streams
            .get_mut(flat)
            .filter(|s| s.stream_type == StreamType::Video)
        {
            stream.resolution = resolution;
        }
    }
}
