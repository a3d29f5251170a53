use crate::state::SharedState;

pub async fn cmd_search(state: &SharedState, query: &str) -> anyhow::Result<()> {
    println!("Searching for: {query}");

    let results = state.catalog.search(query).await?;

    if results.is_empty() {
        println!("No series found matching '{query}'");
        return Ok(());
    }

    println!();
    println!("Search Results:");
    println!("{:-<60}", "");

    for entry in &results {
        super::print_entry("•", entry);
    }

    println!("To add a series: animedl add \"{query}\"");

    Ok(())
}
