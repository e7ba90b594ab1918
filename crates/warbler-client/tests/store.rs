use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::Router;
use axum::extract::Request;
use axum::http::{Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::IntoResponse;
use tokio::net::TcpListener;

use warbler_api::{AppState, router};
use warbler_client::guard::{self, SessionStatus};
use warbler_client::{ApiClient, ClientError, Mutation, Store, paths};
use warbler_db::Database;
use warbler_types::api::{
    CreateAccountRequest, CreateCommentRequest, CreateTweetRequest, EditProfileRequest,
    LikeResponse, LogInRequest,
};
use warbler_types::envelope::ErrorCode;

fn fresh_app() -> Router {
    router(AppState::new(Database::open_in_memory().unwrap(), "client-test-secret"))
}

async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Serve a fresh in-memory instance on an ephemeral port.
async fn spawn_server() -> String {
    serve(fresh_app()).await
}

/// Like `spawn_server`, but tweet detail reads answer 500 while the
/// returned flag is set.
async fn spawn_server_with_broken_detail() -> (String, Arc<AtomicBool>) {
    let broken = Arc::new(AtomicBool::new(false));
    let flag = broken.clone();

    let app = fresh_app().layer(middleware::from_fn(move |req: Request, next: Next| {
        let flag = flag.clone();
        async move {
            let path = req.uri().path();
            let detail = req.method() == Method::GET
                && path.starts_with("/api/tweet/")
                && path != "/api/tweet/all";
            if detail && flag.load(Ordering::SeqCst) {
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
            next.run(req).await
        }
    }));

    (serve(app).await, broken)
}

async fn logged_in(base: &str, name: &str) -> Store {
    let store = Store::new(ApiClient::new(base).unwrap());
    let email = format!("{name}@example.com");
    store
        .create_account(&CreateAccountRequest {
            name: name.into(),
            email: email.clone(),
            password: "secret".into(),
        })
        .await
        .unwrap();
    store
        .log_in(&LogInRequest { email, password: "secret".into() })
        .await
        .unwrap();
    store
}

async fn post(store: &Store, content: &str) -> i64 {
    store
        .create_tweet(&CreateTweetRequest { content: content.into(), urls: vec![] })
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn like_toggle_converges_on_server_state() {
    let base = spawn_server().await;
    let ann = logged_in(&base, "ann").await;
    let bo = logged_in(&base, "bo").await;

    let tweet = post(&ann, "hello").await;
    let original = bo.load_feed().await.unwrap();

    let like = bo.toggle_tweet_like(tweet).await.unwrap();
    assert_eq!(like, LikeResponse { is_liked: true, likes: 1 });

    let fresh = bo.api().feed().await.unwrap().tweets;
    assert_eq!(bo.feed().unwrap(), fresh);
    assert!(bo.is_stale(paths::FEED));

    bo.toggle_tweet_like(tweet).await.unwrap();
    assert_eq!(bo.feed().unwrap(), original);
    assert_eq!(bo.api().feed().await.unwrap().tweets, original);
}

#[tokio::test]
async fn detail_like_tracks_the_viewer() {
    let base = spawn_server().await;
    let ann = logged_in(&base, "ann").await;
    let bo = logged_in(&base, "bo").await;

    let tweet = post(&ann, "hello").await;
    ann.toggle_tweet_like(tweet).await.unwrap();

    bo.load_tweet(tweet).await.unwrap();
    bo.toggle_tweet_like(tweet).await.unwrap();

    let cached = bo.tweet(tweet).unwrap();
    assert!(cached.is_liked);
    assert_eq!(cached, bo.api().tweet(tweet).await.unwrap().tweet);
}

#[tokio::test]
async fn rejected_like_restores_the_cached_feed() {
    let base = spawn_server().await;
    let ann = logged_in(&base, "ann").await;
    let bo = logged_in(&base, "bo").await;

    let tweet = post(&ann, "soon gone").await;
    let before = bo.load_feed().await.unwrap();
    ann.delete_tweet(tweet).await.unwrap();

    let err = bo.toggle_tweet_like(tweet).await.unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::NotFound));
    assert_eq!(bo.feed().unwrap(), before);

    bo.load_feed().await.unwrap();
    assert_eq!(bo.feed().unwrap(), bo.api().feed().await.unwrap().tweets);
}

#[tokio::test]
async fn failed_refetch_does_not_fail_an_accepted_like() {
    let (base, broken) = spawn_server_with_broken_detail().await;
    let ann = logged_in(&base, "ann").await;
    let bo = logged_in(&base, "bo").await;

    let tweet = post(&ann, "hello").await;
    bo.load_tweet(tweet).await.unwrap();

    // Bo's cached likers no longer add up once ann's like lands.
    ann.toggle_tweet_like(tweet).await.unwrap();
    broken.store(true, Ordering::SeqCst);

    let like = Mutation::new();
    let result = like.run(bo.toggle_tweet_like(tweet)).await.unwrap();
    assert_eq!(result, LikeResponse { is_liked: true, likes: 2 });
    assert_eq!(like.state().error, None);

    let cached = bo.tweet(tweet).unwrap();
    assert!(cached.is_liked);
    assert!(cached.likes.iter().any(|l| l.user.id == bo.me().unwrap().id));
}

#[tokio::test]
async fn forbidden_delete_is_rolled_back() {
    let base = spawn_server().await;
    let ann = logged_in(&base, "ann").await;
    let bo = logged_in(&base, "bo").await;

    let tweet = post(&ann, "mine").await;
    let before = bo.load_feed().await.unwrap();

    let err = bo.delete_tweet(tweet).await.unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::Forbidden));

    assert_eq!(bo.feed().unwrap(), before);
    assert_eq!(bo.feed().unwrap(), bo.api().feed().await.unwrap().tweets);
}

#[tokio::test]
async fn comment_through_wrong_tweet_is_rolled_back() {
    let base = spawn_server().await;
    let ann = logged_in(&base, "ann").await;

    let first = post(&ann, "first").await;
    let second = post(&ann, "second").await;
    let comment = ann
        .create_comment(first, &CreateCommentRequest { text: "hi".into(), file: None })
        .await
        .unwrap();

    let detail = ann.load_tweet(second).await.unwrap();
    let err = ann.delete_comment(second, comment.id).await.unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::WrongTweet));
    assert_eq!(ann.tweet(second).unwrap(), detail);

    ann.load_tweet(first).await.unwrap();
    ann.delete_comment(first, comment.id).await.unwrap();
    assert!(ann.tweet(first).unwrap().comments.is_empty());
}

#[tokio::test]
async fn created_items_match_a_fresh_fetch() {
    let base = spawn_server().await;
    let ann = logged_in(&base, "ann").await;
    let me = ann.me().unwrap();

    ann.load_feed().await.unwrap();
    ann.load_profile(me.id).await.unwrap();

    let tweet = post(&ann, "first post").await;
    assert_eq!(ann.feed().unwrap(), ann.api().feed().await.unwrap().tweets);
    assert_eq!(ann.profile(me.id).unwrap(), ann.api().profile(me.id).await.unwrap());

    ann.load_tweet(tweet).await.unwrap();
    ann.create_comment(tweet, &CreateCommentRequest { text: "reply".into(), file: None })
        .await
        .unwrap();
    ann.toggle_comment_like(tweet, ann.tweet(tweet).unwrap().comments[0].id)
        .await
        .unwrap();

    assert_eq!(ann.tweet(tweet).unwrap(), ann.api().tweet(tweet).await.unwrap().tweet);
    assert_eq!(ann.feed().unwrap(), ann.api().feed().await.unwrap().tweets);
}

#[tokio::test]
async fn profile_edit_updates_me() {
    let base = spawn_server().await;
    let ann = logged_in(&base, "ann").await;

    ann.edit_profile(&EditProfileRequest {
        name: "Ann B".into(),
        avatar: Some("https://img/ann.png".into()),
        bio: Some("  ".into()),
    })
    .await
    .unwrap();

    let cached = ann.me().unwrap();
    assert_eq!(cached.name, "Ann B");
    assert_eq!(cached.bio, None);
    assert_eq!(cached, ann.load_me().await.unwrap());

    let err = ann
        .edit_profile(&EditProfileRequest { name: " ".into(), avatar: None, bio: None })
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::InvalidInput));
    assert_eq!(ann.me().unwrap(), cached);
}

#[tokio::test]
async fn mutation_tracks_a_store_write() {
    let base = spawn_server().await;
    let ann = logged_in(&base, "ann").await;
    let tweet = post(&ann, "hello").await;

    let like = Mutation::new();
    like.run(ann.toggle_tweet_like(tweet)).await.unwrap();
    assert_eq!(like.state().data, Some(LikeResponse { is_liked: true, likes: 1 }));

    like.run(ann.toggle_tweet_like(tweet + 100)).await.unwrap_err();
    let state = like.state();
    assert!(!state.loading);
    assert!(state.error.is_some());
}

#[tokio::test]
async fn log_out_drops_the_session() {
    let base = spawn_server().await;
    let ann = logged_in(&base, "ann").await;
    ann.load_feed().await.unwrap();

    ann.log_out().await.unwrap();
    assert!(ann.me().is_none());
    assert!(ann.feed().is_none());

    let me = ann.api().me().await;
    assert!(matches!(me, Err(ClientError::Unauthorized)));
    let status = SessionStatus::from_me(&me);
    assert_eq!(guard::redirect_for(status, "/"), Some(guard::LOG_IN_ROUTE));
}
