//! Display utilities for formatting CLI output.
//!
//! Table rows for the names an import creates and for the outcome of a run.

use tabled::{Table, Tabled};

use geoetl_core::ImportWorker;

/// Table row representation for one map an import would create.
#[derive(Tabled)]
pub struct NameRow {
    /// Map name inside the mapset.
    #[tabled(rename = "Name")]
    pub name: String,
    /// Map type, `raster` or `vector`.
    #[tabled(rename = "Type")]
    pub kind: String,
    /// Mapset the map is created in.
    #[tabled(rename = "Mapset")]
    pub mapset: String,
}

/// Table row representation for a finished import.
#[derive(Tabled)]
pub struct SummaryRow {
    #[tabled(rename = "Import")]
    pub id: String,
    #[tabled(rename = "Strategy")]
    pub strategy: String,
    #[tabled(rename = "Source")]
    pub source: String,
    #[tabled(rename = "Maps")]
    pub maps: String,
    #[tabled(rename = "State")]
    pub state: String,
}

/// Rows for every name `worker` creates.
#[must_use]
pub fn name_rows(worker: &ImportWorker) -> Vec<NameRow> {
    let object = worker.object();
    worker
        .names()
        .into_iter()
        .map(|name| NameRow {
            name,
            kind: object.kind().to_string(),
            mapset: object.mapset().to_string(),
        })
        .collect()
}

/// Summary row of `worker` after a run.
#[must_use]
pub fn summary_row(worker: &ImportWorker) -> SummaryRow {
    SummaryRow {
        id: worker.id().to_string(),
        strategy: worker.strategy().kind().to_string(),
        source: worker.src_description(),
        maps: worker.names().join(", "),
        state: format!("{:?}", worker.state()),
    }
}

/// Prints the names `worker` would create.
pub fn display_names(worker: &ImportWorker) {
    let rows = name_rows(worker);
    println!("\nMaps ({} total):\n", rows.len());
    println!("{}", Table::new(rows));
}

/// Prints the outcome of a run.
pub fn display_summary(worker: &ImportWorker) {
    println!("{}", Table::new([summary_row(worker)]));
}
