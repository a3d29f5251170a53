pub mod aggregator;
pub use aggregator::{SeriesStatusAggregator, aggregate_status};

pub mod discovery;
pub use discovery::{DiscoveryBridge, DiscoveryReport};

pub mod episode_state;
pub use episode_state::{EpisodeError, EpisodeStateMachine, StartReport};

pub mod library;
pub use library::{AddSeriesResult, LibraryError, LibraryService};

pub mod queue;
pub use queue::{DownloadQueue, DownloadWorker, JobDispatcher};

pub mod resolver;
pub use resolver::{ResolutionError, VideoUrlResolver};

pub mod scheduler;
pub use scheduler::Scheduler;

pub mod transfer;
pub use transfer::{CancelProbe, ProgressSink, StreamingDownloader, TransferError, TransferOutcome};
