mod batch;
mod dataset;
mod loader;
mod source;

pub use batch::Batch;
pub use dataset::ImageDataset;
pub use loader::{Batches, DataLoader};
pub use source::{CsvDataSource, DataSource, InMemoryDataSource, Split};
