//! Ties writes to cache edits: every mutation is applied to the affected
//! cached reads first, then sent, then confirmed or rolled back.

use std::sync::{Mutex, MutexGuard};

use tokio::sync::broadcast;
use tracing::{info, warn};

use warbler_types::api::{
    ChangePasswordRequest, CreateAccountRequest, CreateCommentRequest, CreateTweetRequest,
    EditProfileRequest, LikeResponse, LogInRequest, ProfileResponse,
};
use warbler_types::models::{
    Author, CommentId, NewComment, NewTweet, TweetDetail, TweetId, TweetSummary, UserId,
    UserProfile,
};

use crate::cache::{MutationId, QueryCache};
use crate::edits;
use crate::error::ClientError;
use crate::http::ApiClient;
use crate::paths;

struct Caches {
    me: QueryCache<UserProfile>,
    feed: QueryCache<Vec<TweetSummary>>,
    profiles: QueryCache<ProfileResponse>,
    tweets: QueryCache<TweetDetail>,
}

impl Caches {
    fn new(events: &broadcast::Sender<String>) -> Self {
        Self {
            me: QueryCache::with_events(events.clone()),
            feed: QueryCache::with_events(events.clone()),
            profiles: QueryCache::with_events(events.clone()),
            tweets: QueryCache::with_events(events.clone()),
        }
    }

    fn viewer(&self) -> Option<UserProfile> {
        self.me.get(paths::ME).cloned()
    }

    fn edit_feed<F>(&mut self, id: MutationId, edit: F)
    where
        F: Fn(&Vec<TweetSummary>) -> Vec<TweetSummary> + Send + Sync + 'static,
    {
        self.feed.apply_optimistic_as(id, paths::FEED, edit);
    }

    fn edit_profiles<F>(&mut self, id: MutationId, edit: F)
    where
        F: Fn(&ProfileResponse) -> ProfileResponse + Clone + Send + Sync + 'static,
    {
        for key in self.profiles.keys() {
            self.profiles.apply_optimistic_as(id, &key, edit.clone());
        }
    }

    fn reject(&mut self, id: MutationId) -> usize {
        self.me.reject_all(id)
            + self.feed.reject_all(id)
            + self.profiles.reject_all(id)
            + self.tweets.reject_all(id)
    }
}

pub struct Store {
    api: ApiClient,
    caches: Mutex<Caches>,
    events: broadcast::Sender<String>,
}

impl Store {
    pub fn new(api: ApiClient) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            caches: Mutex::new(Caches::new(&events)),
            api,
            events,
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Keys of cached reads whose rendered value changed.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.events.subscribe()
    }

    fn caches(&self) -> MutexGuard<'_, Caches> {
        self.caches.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn viewer(&self) -> Result<UserProfile, ClientError> {
        self.caches().viewer().ok_or(ClientError::Unauthorized)
    }

    // -- Cached reads --

    pub fn me(&self) -> Option<UserProfile> {
        self.caches().viewer()
    }

    pub fn feed(&self) -> Option<Vec<TweetSummary>> {
        self.caches().feed.get(paths::FEED).cloned()
    }

    pub fn tweet(&self, id: TweetId) -> Option<TweetDetail> {
        self.caches().tweets.get(&paths::tweet(id)).cloned()
    }

    pub fn profile(&self, id: UserId) -> Option<ProfileResponse> {
        self.caches().profiles.get(&paths::profile(id)).cloned()
    }

    pub fn is_stale(&self, key: &str) -> bool {
        let caches = self.caches();
        caches.me.is_stale(key)
            || caches.feed.is_stale(key)
            || caches.profiles.is_stale(key)
            || caches.tweets.is_stale(key)
    }

    // -- Fetches --

    pub async fn load_me(&self) -> Result<UserProfile, ClientError> {
        match self.api.me().await {
            Ok(resp) => {
                self.caches().me.insert(paths::ME, resp.user.clone());
                Ok(resp.user)
            }
            Err(e) => {
                if matches!(e, ClientError::Unauthorized) {
                    self.caches().me.remove(paths::ME);
                }
                Err(e)
            }
        }
    }

    pub async fn load_feed(&self) -> Result<Vec<TweetSummary>, ClientError> {
        let tweets = self.api.feed().await?.tweets;
        self.caches().feed.insert(paths::FEED, tweets.clone());
        Ok(tweets)
    }

    pub async fn load_tweet(&self, id: TweetId) -> Result<TweetDetail, ClientError> {
        let tweet = self.api.tweet(id).await?.tweet;
        self.caches().tweets.insert(paths::tweet(id), tweet.clone());
        Ok(tweet)
    }

    pub async fn load_profile(&self, id: UserId) -> Result<ProfileResponse, ClientError> {
        let profile = self.api.profile(id).await?;
        self.caches().profiles.insert(paths::profile(id), profile.clone());
        Ok(profile)
    }

    // -- Session --

    pub async fn create_account(&self, req: &CreateAccountRequest) -> Result<(), ClientError> {
        self.api.create_account(req).await
    }

    pub async fn log_in(&self, req: &LogInRequest) -> Result<UserProfile, ClientError> {
        let user = self.api.log_in(req).await?.user;
        info!("Logged in as {} ({})", user.name, user.id);

        // Another user's cached reads carry their isLiked flags.
        *self.caches() = Caches::new(&self.events);
        self.caches().me.insert(paths::ME, user.clone());
        Ok(user)
    }

    pub async fn log_out(&self) -> Result<(), ClientError> {
        self.api.log_out().await?;
        *self.caches() = Caches::new(&self.events);
        Ok(())
    }

    pub async fn change_password(&self, req: &ChangePasswordRequest) -> Result<(), ClientError> {
        self.api.change_password(req).await
    }

    pub async fn edit_profile(&self, req: &EditProfileRequest) -> Result<(), ClientError> {
        let viewer = self.viewer()?;
        let id = MutationId::new();
        let name = req.name.trim().to_string();
        let avatar = blank_to_none(&req.avatar);
        let bio = blank_to_none(&req.bio);

        let apply = move |user: &mut UserProfile| {
            user.name = name.clone();
            user.avatar = avatar.clone();
            user.bio = bio.clone();
        };

        {
            let mut caches = self.caches();
            let edit = apply.clone();
            caches.me.apply_optimistic_as(id, paths::ME, move |user| {
                let mut next = user.clone();
                edit(&mut next);
                next
            });
            let edit = apply.clone();
            caches.profiles.apply_optimistic_as(id, &paths::profile(viewer.id), move |profile| {
                let mut next = profile.clone();
                edit(&mut next.user);
                next
            });
        }

        match self.api.edit_profile(req).await {
            Ok(()) => {
                let mut caches = self.caches();
                caches.me.confirm(paths::ME, id, |user| apply(user));
                caches
                    .profiles
                    .confirm(&paths::profile(viewer.id), id, |profile| apply(&mut profile.user));
                Ok(())
            }
            Err(e) => Err(self.roll_back(id, "edit profile", e)),
        }
    }

    // -- Tweets --

    pub async fn create_tweet(&self, req: &CreateTweetRequest) -> Result<NewTweet, ClientError> {
        let viewer = self.viewer()?;
        let tweet = self.api.create_tweet(req).await?.tweet;

        let summary = edits::summary_from_new(tweet.clone(), Author::from(&viewer));
        let mut caches = self.caches();
        caches.feed.patch(paths::FEED, |feed| edits::prepend_to_list(feed, summary.clone()));
        caches.profiles.patch(&paths::profile(viewer.id), |profile| {
            edits::prepend_to_list(&mut profile.tweets, summary)
        });

        Ok(tweet)
    }

    pub async fn toggle_tweet_like(&self, tweet: TweetId) -> Result<LikeResponse, ClientError> {
        let viewer = Author::from(&self.viewer()?);
        let id = MutationId::new();
        let detail_key = paths::tweet(tweet);

        {
            let mut caches = self.caches();
            caches.edit_feed(id, move |feed| edits::toggle_like_in_list(feed, tweet));
            caches.edit_profiles(id, move |profile| edits::toggle_like_in_profile(profile, tweet));
            let liker = viewer.clone();
            caches
                .tweets
                .apply_optimistic_as(id, &detail_key, move |detail| edits::toggle_detail_like(detail, &liker));
        }

        let like = match self.api.toggle_tweet_like(tweet).await {
            Ok(like) => like,
            Err(e) => return Err(self.roll_back(id, "like tweet", e)),
        };

        let mut drifted = false;
        {
            let mut caches = self.caches();
            caches
                .feed
                .confirm(paths::FEED, id, |feed| edits::apply_like_in_list(feed, tweet, like));
            caches
                .profiles
                .confirm_all(id, |profile| edits::apply_like_in_profile(profile, tweet, like));
            caches.tweets.confirm(&detail_key, id, |detail| {
                drifted = !edits::apply_detail_like(detail, &viewer, like);
            });
        }

        if drifted {
            self.refresh_tweet(tweet).await;
        }
        Ok(like)
    }

    pub async fn delete_tweet(&self, tweet: TweetId) -> Result<(), ClientError> {
        let id = MutationId::new();
        {
            let mut caches = self.caches();
            caches.edit_feed(id, move |feed| edits::remove_from_list(feed, tweet));
            caches.edit_profiles(id, move |profile| edits::remove_from_profile(profile, tweet));
        }

        if let Err(e) = self.api.delete_tweet(tweet).await {
            return Err(self.roll_back(id, "delete tweet", e));
        }

        let mut caches = self.caches();
        caches
            .feed
            .confirm(paths::FEED, id, |feed| feed.retain(|t| t.id != tweet));
        caches.profiles.confirm_all(id, |profile| {
            profile.tweets.retain(|t| t.id != tweet);
            profile.liked_tweets.retain(|t| t.id != tweet);
        });
        caches.tweets.remove(&paths::tweet(tweet));
        Ok(())
    }

    // -- Comments --

    pub async fn create_comment(
        &self,
        tweet: TweetId,
        req: &CreateCommentRequest,
    ) -> Result<NewComment, ClientError> {
        let viewer = self.viewer()?;
        let comment = self.api.create_comment(tweet, req).await?.comment;

        let view = edits::comment_from_new(comment.clone(), Author::from(&viewer));
        let mut caches = self.caches();
        caches
            .tweets
            .patch(&paths::tweet(tweet), |detail| edits::prepend_comment(detail, view));
        caches
            .feed
            .patch(paths::FEED, |feed| edits::adjust_comment_count(feed, tweet, 1));
        for key in caches.profiles.keys() {
            caches.profiles.patch(&key, |profile| {
                edits::adjust_comment_count(&mut profile.tweets, tweet, 1);
                edits::adjust_comment_count(&mut profile.liked_tweets, tweet, 1);
            });
        }

        Ok(comment)
    }

    pub async fn toggle_comment_like(
        &self,
        tweet: TweetId,
        comment: CommentId,
    ) -> Result<LikeResponse, ClientError> {
        let viewer = self.viewer()?.id;
        let key = paths::tweet(tweet);

        let id = self
            .caches()
            .tweets
            .apply_optimistic(&key, move |detail| edits::toggle_comment_like(detail, comment, viewer));

        let like = match self.api.toggle_comment_like(tweet, comment).await {
            Ok(like) => like,
            Err(e) => {
                return Err(match id {
                    Some(id) => self.roll_back(id, "like comment", e),
                    None => e,
                });
            }
        };

        let mut drifted = false;
        if let Some(id) = id {
            self.caches().tweets.confirm(&key, id, |detail| {
                drifted = !edits::apply_comment_like(detail, comment, viewer, like);
            });
        }

        if drifted {
            self.refresh_tweet(tweet).await;
        }
        Ok(like)
    }

    pub async fn delete_comment(&self, tweet: TweetId, comment: CommentId) -> Result<(), ClientError> {
        let id = MutationId::new();
        let key = paths::tweet(tweet);

        self.caches()
            .tweets
            .apply_optimistic_as(id, &key, move |detail| edits::remove_comment(detail, comment));

        if let Err(e) = self.api.delete_comment(tweet, comment).await {
            return Err(self.roll_back(id, "delete comment", e));
        }

        let mut caches = self.caches();
        caches
            .tweets
            .confirm(&key, id, |detail| detail.comments.retain(|c| c.id != comment));
        caches
            .feed
            .patch(paths::FEED, |feed| edits::adjust_comment_count(feed, tweet, -1));
        for key in caches.profiles.keys() {
            caches.profiles.patch(&key, |profile| {
                edits::adjust_comment_count(&mut profile.tweets, tweet, -1);
                edits::adjust_comment_count(&mut profile.liked_tweets, tweet, -1);
            });
        }
        Ok(())
    }

    /// Refetch after a write the server already accepted. A failure here
    /// leaves the confirmed cache in place and does not fail the write.
    async fn refresh_tweet(&self, tweet: TweetId) {
        if let Err(e) = self.load_tweet(tweet).await {
            warn!("Refetch of tweet {} after a like failed: {}", tweet, e);
        }
    }

    fn roll_back(&self, id: MutationId, action: &str, err: ClientError) -> ClientError {
        let reverted = self.caches().reject(id);
        warn!("{} failed, rolled back {} cached reads: {}", action, reverted, err);
        if matches!(err, ClientError::Unauthorized) {
            self.caches().me.remove(paths::ME);
        }
        err
    }
}

fn blank_to_none(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
