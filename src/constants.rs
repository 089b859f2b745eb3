/// Toronto Open Data runs on CKAN: https://docs.ckan.org/en/latest/api/
pub const DEFAULT_BASE_URL: &str = "https://ckan0.cf.opendata.inter.prod-toronto.ca";
pub const DEFAULT_PACKAGE_ID: &str = "dinesafe";

pub const PACKAGE_SHOW_PATH: &str = "/api/3/action/package_show";
pub const DATASTORE_DUMP_PATH: &str = "/datastore/dump/";

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

pub const SNAPSHOT_PREFIX: &str = "dinesafe_data_";
pub const SNAPSHOT_EXTENSION: &str = "parquet";
pub const METADATA_FILE: &str = "metadata.json";

// Source column names, as published in the datastore dump
pub const COL_RECORD_ID: &str = "_id";
pub const COL_ESTABLISHMENT_ID: &str = "Establishment ID";
pub const COL_INSPECTION_ID: &str = "Inspection ID";
pub const COL_ESTABLISHMENT_NAME: &str = "Establishment Name";
pub const COL_ESTABLISHMENT_TYPE: &str = "Establishment Type";
pub const COL_ESTABLISHMENT_ADDRESS: &str = "Establishment Address";
pub const COL_ESTABLISHMENT_STATUS: &str = "Establishment Status";
pub const COL_MIN_INSPECTIONS: &str = "Min. Inspections Per Year";
pub const COL_INFRACTION_DETAILS: &str = "Infraction Details";
pub const COL_INSPECTION_DATE: &str = "Inspection Date";
pub const COL_SEVERITY: &str = "Severity";
pub const COL_ACTION: &str = "Action";
pub const COL_OUTCOME: &str = "Outcome";
pub const COL_AMOUNT_FINED: &str = "Amount Fined";
pub const COL_LATITUDE: &str = "Latitude";
pub const COL_LONGITUDE: &str = "Longitude";
pub const COL_UNIQUE_ID: &str = "unique_id";

/// Column order of a normalized table.
pub const COLUMNS: [&str; 17] = [
    COL_RECORD_ID,
    COL_ESTABLISHMENT_ID,
    COL_INSPECTION_ID,
    COL_ESTABLISHMENT_NAME,
    COL_ESTABLISHMENT_TYPE,
    COL_ESTABLISHMENT_ADDRESS,
    COL_ESTABLISHMENT_STATUS,
    COL_MIN_INSPECTIONS,
    COL_INFRACTION_DETAILS,
    COL_INSPECTION_DATE,
    COL_SEVERITY,
    COL_ACTION,
    COL_OUTCOME,
    COL_AMOUNT_FINED,
    COL_LATITUDE,
    COL_LONGITUDE,
    COL_UNIQUE_ID,
];
