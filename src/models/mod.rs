//! Wire and domain types shared by the client, the services and the CLI.

pub mod entrance;
pub mod exit;
pub mod lenient;
pub mod report;
pub mod search;

pub use entrance::{Entrance, EntranceForm, ExitPatch, MutationResponse, PartNumberQuantity};
pub use exit::{
    platform_key, ExitItem, ExitResult, ProcessExitsRequest, ProcessExitsResponse, UnitKind,
    PLATFORM_KEY_PREFIX,
};
pub use report::{DateRangeRequest, MonthlyReport, RecordDetail, ReportItem};
pub use search::{
    AccumulatedPartNumber, FolioSearch, FolioSearchResponse, OneOrMany, PartNumberSearchResult,
};
