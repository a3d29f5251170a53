use crate::domain::SeriesId;
use crate::services::LibraryError;
use crate::state::SharedState;

pub async fn cmd_remove_series(state: &SharedState, id: i32, yes: bool) -> anyhow::Result<()> {
    let series_id = SeriesId::new(id);

    let Some(series) = state.store.get_series(series_id).await? else {
        println!("Series with ID {id} not found in the library.");
        println!("Use 'animedl list' to see series IDs.");
        return Ok(());
    };

    if !yes {
        println!(
            "Remove '{}' (ID: {}) with all episodes and files?",
            series.title, series.id
        );
        println!("Enter 'y' to confirm, anything else to cancel:");

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Cancelled.");
            return Ok(());
        }
    }

    match state.library.delete_series(series_id).await {
        Ok(removed) => println!("✓ Removed: {}", removed.title),
        Err(LibraryError::SeriesNotFound(_)) => println!("Series was already removed."),
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
