use crate::state::SharedState;

pub async fn cmd_add_series(
    state: &SharedState,
    query: &str,
    pick: Option<usize>,
    download: bool,
) -> anyhow::Result<()> {
    println!("Searching for: {query}");

    let results = state.catalog.search(query).await?;

    if results.is_empty() {
        println!("No series found matching '{query}'");
        return Ok(());
    }

    let index = if let Some(n) = pick {
        if !(1..=results.len()).contains(&n) {
            println!("Invalid selection: {n} (1-{})", results.len());
            return Ok(());
        }
        n - 1
    } else {
        println!();
        println!("Search Results:");
        println!("{:-<60}", "");

        for (i, entry) in results.iter().enumerate() {
            super::print_entry(&format!("[{}]", i + 1), entry);
        }

        println!(
            "Enter number to add (1-{}), or 'q' to cancel:",
            results.len()
        );

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        let input = input.trim();

        if input.eq_ignore_ascii_case("q") || input.is_empty() {
            println!("Cancelled.");
            return Ok(());
        }

        match input.parse::<usize>() {
            Ok(n) if (1..=results.len()).contains(&n) => n - 1,
            _ => {
                println!("Invalid selection.");
                return Ok(());
            }
        }
    };

    let entry = &results[index];

    if download {
        state.queue.open();
    }

    let result = state.library.add_series(entry).await?;

    if result.created {
        println!("✓ Added: {}", result.series.title);
    } else {
        println!("✓ Refreshed: {}", result.series.title);
    }
    println!("  ID: {}", result.series.id);
    println!("  Episodes: {}", result.episodes);
    println!("  Status: {}", result.series.status);
    println!(
        "  Folder: {}",
        state.layout.series_dir(&result.series.directory_name).display()
    );

    if download {
        println!();
        println!("Downloading {} episode(s)...", result.queued);
        state.run_pending_jobs().await?;
        state.queue.close();

        if let Some(series) = state.store.get_series(result.series.id).await? {
            println!("✓ Done. Series status: {}", series.status);
        }
    } else {
        println!();
        println!("Downloads were not started. Run 'animedl check' or 'animedl daemon' to fetch them.");
    }

    Ok(())
}
