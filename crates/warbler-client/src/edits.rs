//! Pure cache transforms. Each takes the previous cached value and returns
//! (or patches) the next one; nothing here talks to the network.

use warbler_types::api::{LikeResponse, ProfileResponse};
use warbler_types::models::{
    Author, CommentId, CommentLiker, CommentView, Counts, Liker, NewComment, NewTweet,
    TweetDetail, TweetId, TweetSummary, UserId,
};

fn flip(liked: bool, count: i64) -> (bool, i64) {
    if liked {
        (false, (count - 1).max(0))
    } else {
        (true, count + 1)
    }
}

// -- Tweet lists (feed, profile) --

pub fn toggle_like_in_list(tweets: &[TweetSummary], id: TweetId) -> Vec<TweetSummary> {
    tweets
        .iter()
        .map(|t| {
            if t.id != id {
                return t.clone();
            }
            let (is_liked, likes) = flip(t.is_liked, t.count.likes);
            TweetSummary {
                is_liked,
                count: Counts { likes, ..t.count },
                ..t.clone()
            }
        })
        .collect()
}

pub fn apply_like_in_list(tweets: &mut [TweetSummary], id: TweetId, like: LikeResponse) {
    for t in tweets.iter_mut().filter(|t| t.id == id) {
        t.is_liked = like.is_liked;
        t.count.likes = like.likes;
    }
}

pub fn remove_from_list(tweets: &[TweetSummary], id: TweetId) -> Vec<TweetSummary> {
    tweets.iter().filter(|t| t.id != id).cloned().collect()
}

/// Feed and profile lists are newest first.
pub fn prepend_to_list(tweets: &mut Vec<TweetSummary>, tweet: TweetSummary) {
    if tweets.iter().all(|t| t.id != tweet.id) {
        tweets.insert(0, tweet);
    }
}

pub fn adjust_comment_count(tweets: &mut [TweetSummary], id: TweetId, delta: i64) {
    for t in tweets.iter_mut().filter(|t| t.id == id) {
        t.count.comments = (t.count.comments + delta).max(0);
    }
}

pub fn summary_from_new(tweet: NewTweet, author: Author) -> TweetSummary {
    TweetSummary {
        id: tweet.id,
        content: tweet.content,
        author_id: tweet.author_id,
        created_at: tweet.created_at,
        updated_at: tweet.updated_at,
        author,
        files: tweet.files,
        count: Counts::default(),
        is_liked: false,
    }
}

// -- Profile --

pub fn toggle_like_in_profile(profile: &ProfileResponse, id: TweetId) -> ProfileResponse {
    ProfileResponse {
        user: profile.user.clone(),
        tweets: toggle_like_in_list(&profile.tweets, id),
        liked_tweets: toggle_like_in_list(&profile.liked_tweets, id),
    }
}

pub fn apply_like_in_profile(profile: &mut ProfileResponse, id: TweetId, like: LikeResponse) {
    apply_like_in_list(&mut profile.tweets, id, like);
    apply_like_in_list(&mut profile.liked_tweets, id, like);
}

pub fn remove_from_profile(profile: &ProfileResponse, id: TweetId) -> ProfileResponse {
    ProfileResponse {
        user: profile.user.clone(),
        tweets: remove_from_list(&profile.tweets, id),
        liked_tweets: remove_from_list(&profile.liked_tweets, id),
    }
}

// -- Tweet detail --

/// Flip the viewer's like: add or remove them from the likers list.
pub fn toggle_detail_like(tweet: &TweetDetail, viewer: &Author) -> TweetDetail {
    let mut next = tweet.clone();
    set_detail_liker(&mut next, viewer, !tweet.is_liked);
    next
}

/// Write the server's like result. Returns false when the likers list
/// cannot account for the server's total, meaning other users' likes moved
/// and the detail should be fetched again.
pub fn apply_detail_like(tweet: &mut TweetDetail, viewer: &Author, like: LikeResponse) -> bool {
    set_detail_liker(tweet, viewer, like.is_liked);
    tweet.likes.len() as i64 == like.likes
}

fn set_detail_liker(tweet: &mut TweetDetail, viewer: &Author, liked: bool) {
    tweet.is_liked = liked;
    tweet.likes.retain(|l| l.user.id != viewer.id);
    if liked {
        tweet.likes.push(Liker { user: viewer.clone() });
    }
}

pub fn toggle_comment_like(tweet: &TweetDetail, comment: CommentId, viewer: UserId) -> TweetDetail {
    let mut next = tweet.clone();
    if let Some(c) = next.comments.iter_mut().find(|c| c.id == comment) {
        let liked = !c.is_liked;
        set_comment_liker(c, viewer, liked);
    }
    next
}

/// Same contract as [`apply_detail_like`], for one comment.
pub fn apply_comment_like(
    tweet: &mut TweetDetail,
    comment: CommentId,
    viewer: UserId,
    like: LikeResponse,
) -> bool {
    match tweet.comments.iter_mut().find(|c| c.id == comment) {
        Some(c) => {
            set_comment_liker(c, viewer, like.is_liked);
            c.likes.len() as i64 == like.likes
        }
        None => false,
    }
}

fn set_comment_liker(comment: &mut CommentView, viewer: UserId, liked: bool) {
    comment.is_liked = liked;
    comment.likes.retain(|l| l.user_id != viewer);
    if liked {
        comment.likes.push(CommentLiker { user_id: viewer });
    }
}

pub fn remove_comment(tweet: &TweetDetail, comment: CommentId) -> TweetDetail {
    TweetDetail {
        comments: tweet
            .comments
            .iter()
            .filter(|c| c.id != comment)
            .cloned()
            .collect(),
        ..tweet.clone()
    }
}

/// Comments are listed newest first.
pub fn prepend_comment(tweet: &mut TweetDetail, comment: CommentView) {
    if tweet.comments.iter().all(|c| c.id != comment.id) {
        tweet.comments.insert(0, comment);
    }
}

pub fn comment_from_new(comment: NewComment, author: Author) -> CommentView {
    CommentView {
        id: comment.id,
        text: comment.text,
        file: comment.file,
        created_at: comment.created_at,
        author,
        likes: Vec::new(),
        is_liked: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use warbler_types::models::{FileUrl, UserProfile};

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn author(id: UserId) -> Author {
        Author {
            id,
            name: format!("user{id}"),
            email: format!("user{id}@example.com"),
            avatar: None,
        }
    }

    fn summary(id: TweetId, liked: bool, likes: i64) -> TweetSummary {
        TweetSummary {
            id,
            content: format!("tweet {id}"),
            author_id: 1,
            created_at: at(id),
            updated_at: at(id),
            author: author(1),
            files: vec![],
            count: Counts { likes, comments: 0 },
            is_liked: liked,
        }
    }

    fn comment(id: CommentId, likers: &[UserId]) -> CommentView {
        CommentView {
            id,
            text: format!("comment {id}"),
            file: None,
            created_at: at(id),
            author: author(2),
            likes: likers.iter().map(|&user_id| CommentLiker { user_id }).collect(),
            is_liked: likers.contains(&1),
        }
    }

    fn detail() -> TweetDetail {
        TweetDetail {
            id: 10,
            content: "hello".into(),
            author_id: 2,
            created_at: at(0),
            updated_at: at(0),
            author: author(2),
            files: vec![FileUrl { url: "https://img/1.png".into() }],
            comments: vec![comment(2, &[3]), comment(1, &[])],
            likes: vec![Liker { user: author(3) }],
            is_liked: false,
        }
    }

    #[test]
    fn list_toggle_flips_only_the_target() {
        let tweets = vec![summary(1, false, 0), summary(2, true, 4)];

        let next = toggle_like_in_list(&tweets, 2);
        assert_eq!(next[0], tweets[0]);
        assert!(!next[1].is_liked);
        assert_eq!(next[1].count.likes, 3);

        assert_eq!(toggle_like_in_list(&next, 2), tweets);
    }

    #[test]
    fn unlike_never_goes_below_zero() {
        let tweets = vec![summary(1, true, 0)];
        assert_eq!(toggle_like_in_list(&tweets, 1)[0].count.likes, 0);
    }

    #[test]
    fn server_like_overrides_the_guess() {
        let mut tweets = vec![summary(1, true, 1)];
        apply_like_in_list(&mut tweets, 1, LikeResponse { is_liked: true, likes: 9 });
        assert_eq!(tweets[0].count.likes, 9);
    }

    #[test]
    fn remove_and_prepend() {
        let tweets = vec![summary(2, false, 0), summary(1, false, 0)];

        let mut next = remove_from_list(&tweets, 2);
        assert_eq!(next.iter().map(|t| t.id).collect::<Vec<_>>(), vec![1]);

        prepend_to_list(&mut next, summary(3, false, 0));
        prepend_to_list(&mut next, summary(3, false, 0));
        assert_eq!(next.iter().map(|t| t.id).collect::<Vec<_>>(), vec![3, 1]);

        adjust_comment_count(&mut next, 3, 1);
        assert_eq!(next[0].count.comments, 1);
        adjust_comment_count(&mut next, 3, -5);
        assert_eq!(next[0].count.comments, 0);
    }

    #[test]
    fn profile_edits_touch_both_lists() {
        let profile = ProfileResponse {
            user: UserProfile {
                id: 1,
                name: "user1".into(),
                email: "user1@example.com".into(),
                avatar: None,
                bio: None,
                created_at: at(0),
            },
            tweets: vec![summary(1, true, 1)],
            liked_tweets: vec![summary(1, true, 1)],
        };

        let toggled = toggle_like_in_profile(&profile, 1);
        assert!(!toggled.tweets[0].is_liked);
        assert!(!toggled.liked_tweets[0].is_liked);

        let removed = remove_from_profile(&profile, 1);
        assert!(removed.tweets.is_empty());
        assert!(removed.liked_tweets.is_empty());
    }

    #[test]
    fn detail_toggle_adds_and_removes_viewer() {
        let viewer = author(1);
        let tweet = detail();

        let liked = toggle_detail_like(&tweet, &viewer);
        assert!(liked.is_liked);
        assert_eq!(liked.likes.len(), 2);
        assert_eq!(liked.likes[1].user.id, 1);

        let unliked = toggle_detail_like(&liked, &viewer);
        assert_eq!(unliked, tweet);
    }

    #[test]
    fn detail_like_reports_drift() {
        let viewer = author(1);
        let mut tweet = detail();

        assert!(apply_detail_like(&mut tweet, &viewer, LikeResponse { is_liked: true, likes: 2 }));
        assert!(!apply_detail_like(&mut tweet, &viewer, LikeResponse { is_liked: true, likes: 5 }));
        assert!(tweet.is_liked);
    }

    #[test]
    fn comment_like_toggle_round_trips() {
        let tweet = detail();

        let liked = toggle_comment_like(&tweet, 1, 1);
        assert!(liked.comments[1].is_liked);
        assert_eq!(liked.comments[1].likes, vec![CommentLiker { user_id: 1 }]);
        assert_eq!(toggle_comment_like(&liked, 1, 1), tweet);

        // Unknown comment: nothing changes.
        assert_eq!(toggle_comment_like(&tweet, 99, 1), tweet);
    }

    #[test]
    fn comment_like_apply() {
        let mut tweet = detail();
        assert!(apply_comment_like(&mut tweet, 2, 1, LikeResponse { is_liked: true, likes: 2 }));
        assert!(tweet.comments[0].is_liked);
        assert!(!apply_comment_like(&mut tweet, 99, 1, LikeResponse { is_liked: true, likes: 1 }));
    }

    #[test]
    fn comment_remove_and_prepend() {
        let tweet = detail();

        let mut next = remove_comment(&tweet, 2);
        assert_eq!(next.comments.len(), 1);

        let new = NewComment {
            id: 3,
            text: "fresh".into(),
            file: None,
            created_at: at(3),
        };
        prepend_comment(&mut next, comment_from_new(new, author(1)));
        assert_eq!(next.comments[0].id, 3);
        assert_eq!(next.comments[0].author.id, 1);
        assert!(next.comments[0].likes.is_empty());
    }

    #[test]
    fn new_tweet_becomes_an_unliked_summary() {
        let new = NewTweet {
            id: 5,
            content: "hi".into(),
            author_id: 1,
            created_at: at(5),
            updated_at: at(5),
            files: vec![FileUrl { url: "https://img/a.png".into() }],
        };

        let s = summary_from_new(new, author(1));
        assert_eq!(s.count, Counts::default());
        assert!(!s.is_liked);
        assert_eq!(s.files.len(), 1);
    }
}
