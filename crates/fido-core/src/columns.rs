//! Canonical column names. Uploaded headers are mapped onto these once, at
//! ingestion; everything downstream addresses cells by these names only.

pub const FIDO_ID: &str = "fido_id";
pub const BARCODE: &str = "barcode";
pub const BRAND_ID: &str = "brand_id";
pub const BRAND: &str = "brand";
pub const CATEGORY: &str = "category";
pub const DESCRIPTION: &str = "description";
pub const GMV: &str = "gmv";

pub const UPLOAD_DATE: &str = "upload_date";
pub const UPLOADER: &str = "uploader";
pub const PRIORITY: &str = "priority";

pub const UPDATED_DESCRIPTION: &str = "updated_description";
pub const UPDATED_CATEGORY: &str = "updated_category";
pub const UPDATED_BRAND: &str = "updated_brand";
pub const NO_CHANGE: &str = "no_change";
pub const COMMENTS: &str = "comments";
pub const STATUS: &str = "status";
pub const REVIEWER: &str = "reviewer";
pub const REVIEW_DATE: &str = "review_date";

pub const CLAIMED_BY: &str = "claimed_by";
pub const CLAIMED_DATE: &str = "claimed_date";
pub const PROJECT_STATUS: &str = "project_status";
