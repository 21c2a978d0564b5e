pub mod chat_memory;
pub mod fusion;
pub mod profile;
pub mod recommend;
pub mod signals;

pub use chat_memory::{ArchiveScanStats, ChatMemoryService};
pub use fusion::{fuse_ranked, FusedHit, FusionWeights};
pub use profile::ProfileService;
pub use recommend::RecommendService;
pub use signals::SignalStore;
