mod add;
mod check;
mod control;
mod downloaded;
mod episodes;
mod list;
mod remove;
mod search;

pub use add::cmd_add_series;
pub use check::{cmd_check, cmd_retry_failed};
pub use control::{
    cmd_cancel, cmd_cancel_series, cmd_download, cmd_resume, cmd_resume_series, cmd_skip,
    cmd_skip_series,
};
pub use downloaded::cmd_downloaded;
pub use episodes::cmd_episodes;
pub use list::cmd_list_series;
pub use remove::cmd_remove_series;
pub use search::cmd_search;

use crate::models::catalog::CatalogEntry;

fn print_entry(prefix: &str, entry: &CatalogEntry) {
    let eps = entry
        .episodes_count
        .map_or_else(|| "? eps".to_string(), |e| format!("{e} eps"));
    let year = entry.year.as_deref().unwrap_or("?");

    println!("{prefix} {} ({}, {})", entry.title, year, eps);
    if let Some(studio) = &entry.studio {
        println!("    Studio: {studio}");
    }
    println!("    ID: {} | {}", entry.id, entry.url);
    println!();
}
