//! Authorization policy for mutating actions.
//!
//! Every ownership decision goes through [`evaluate`], so tweet and comment
//! handlers share one definition of who may do what.

use thiserror::Error;

use warbler_types::models::{TweetId, UserId};

/// The authenticated user performing an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
}

/// The target of an action, with the ownership facts the policy needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Tweet {
        author_id: UserId,
    },
    /// A comment addressed through `/tweet/{via_tweet}/comment/..`.
    Comment {
        author_id: UserId,
        tweet_id: TweetId,
        via_tweet: TweetId,
    },
}

impl Resource {
    pub fn author_id(&self) -> UserId {
        match self {
            Resource::Tweet { author_id } | Resource::Comment { author_id, .. } => *author_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Delete,
    Like,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Denial {
    #[error("only the author can do that")]
    NotOwner,

    #[error("that comment does not belong to this tweet")]
    WrongTweet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(Denial),
}

impl Decision {
    pub fn into_result(self) -> Result<(), Denial> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(denial) => Err(denial),
        }
    }
}

/// Decide whether `actor` may perform `action` on `resource`.
///
/// A comment reached through a tweet it does not belong to is refused for
/// every actor and every action. Beyond that anyone may like, and only the
/// author may delete.
pub fn evaluate(actor: Actor, resource: Resource, action: Action) -> Decision {
    if let Resource::Comment { tweet_id, via_tweet, .. } = resource {
        if tweet_id != via_tweet {
            return Decision::Deny(Denial::WrongTweet);
        }
    }

    match action {
        Action::Like => Decision::Allow,
        Action::Delete if resource.author_id() == actor.user_id => Decision::Allow,
        Action::Delete => Decision::Deny(Denial::NotOwner),
    }
}
