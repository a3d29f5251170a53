use crate::state::SharedState;

pub async fn cmd_downloaded(state: &SharedState) -> anyhow::Result<()> {
    let downloaded = state.store.list_downloaded().await?;

    if downloaded.is_empty() {
        println!("No downloaded episodes yet.");
        return Ok(());
    }

    println!("Downloaded Episodes ({}):", downloaded.len());
    println!("{:-<70}", "");

    for item in &downloaded {
        println!(
            "{} - Episode {}",
            item.series_title, item.episode.number
        );
        if let Some(path) = &item.episode.file_path {
            println!("    {path}");
        }
    }

    Ok(())
}
