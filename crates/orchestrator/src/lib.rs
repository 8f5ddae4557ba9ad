pub mod middleware;
pub mod orchestrator;

pub use middleware::{CacheKeyFn, CachingMiddleware, LoggingMiddleware, Middleware, Next};
pub use orchestrator::{suggest_similar, Orchestrator};
