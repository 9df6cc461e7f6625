//! Paths of the stage-entrance REST resource.

pub const LIST_ENTRANCES: &str = "/api/StageEntrance/GetStageEntrances";
pub const CREATE_ENTRANCE: &str = "/api/StageEntrance/Create";
pub const UPDATE_ENTRANCE: &str = "/api/StageEntrance/Update";
pub const UPDATE_EXITS: &str = "/api/StageEntrance/UpdateExits";
pub const DELETE_ENTRANCE: &str = "/api/StageEntrance/Delete";
pub const SEARCH_BY_FOLIO: &str = "/api/StageEntrance/SearchByFolio";
pub const SEARCH_BY_PART_NUMBER: &str = "/api/StageEntrance/SearchByPartNumber";
pub const PROCESS_EXITS: &str = "/api/StageEntrance/ProcessExits";
pub const AVAILABLE_REPORTS: &str = "/api/StageEntrance/Available-Reports";
pub const DOWNLOAD_MONTHLY_REPORT: &str = "/api/StageEntrance/DownloadMonthlyReport";
pub const DOWNLOAD_REPORT_BY_DATE_RANGE: &str = "/api/StageEntrance/DownloadReportByDateRange";
