pub mod chain;
pub mod discord;
pub mod hypixel;
pub mod mojang;
pub mod playerdb;
pub mod traits;

// Trait exports
pub use traits::{
    DeliveryError, FetchError, IdentityResolver, LoginFetcher, LoginSnapshot, Notifier,
    ResolveError,
};

pub use chain::ResolverChain;
pub use discord::DiscordNotifier;
pub use hypixel::HypixelFetcher;
pub use mojang::MojangResolver;
pub use playerdb::PlayerDbResolver;
