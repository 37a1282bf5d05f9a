pub mod db;
pub mod ingestion;
pub mod object_store;
pub mod pdf_browser;
pub mod pdf_convert;
pub mod search;

pub use db::DbAdapter;
pub use ingestion::IngestionApiAdapter;
pub use object_store::HttpObjectStore;
pub use pdf_browser::ChromiumPdfRenderer;
pub use pdf_convert::SoftwarePdfConverter;
pub use search::SearchClusterAdapter;
