use warbler_types::MAX_TWEET_IMAGES;
use warbler_types::api::CreateTweetRequest;

/// Draft tweet: text plus up to [`MAX_TWEET_IMAGES`] image URLs.
#[derive(Debug, Clone, Default)]
pub struct Composer {
    content: String,
    images: Vec<(u32, String)>,
    next_key: u32,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Attach an image. Returns a key for removing it later, or `None` when
    /// the draft is full or the URL is blank.
    pub fn add_image(&mut self, url: impl Into<String>) -> Option<u32> {
        let url = url.into();
        if self.is_full() || url.trim().is_empty() {
            return None;
        }

        let key = self.next_key;
        self.next_key += 1;
        self.images.push((key, url));
        Some(key)
    }

    pub fn remove_image(&mut self, key: u32) -> bool {
        let before = self.images.len();
        self.images.retain(|(k, _)| *k != key);
        self.images.len() != before
    }

    pub fn images(&self) -> impl Iterator<Item = &str> {
        self.images.iter().map(|(_, url)| url.as_str())
    }

    pub fn is_full(&self) -> bool {
        self.images.len() >= MAX_TWEET_IMAGES
    }

    pub fn can_submit(&self) -> bool {
        !self.content.trim().is_empty()
    }

    pub fn clear(&mut self) {
        self.content.clear();
        self.images.clear();
    }

    pub fn to_request(&self) -> CreateTweetRequest {
        CreateTweetRequest {
            content: self.content.clone(),
            urls: self.images().map(str::to_string).collect(),
        }
    }
}
