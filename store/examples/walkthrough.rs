//! Tour of the vocabulary store: write, query, rebuild and persist.
//!
//! Usage: cargo run -p vdb-store --example walkthrough

use std::path::Path;

use tracing_subscriber::EnvFilter;
use vdb_store::{StoreConfig, VocabStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut store = VocabStore::from_config(StoreConfig::default()).await?;

    // --- Write / read ---
    store.add("Hello world!").await?;
    store.add("Hallo, wereld!").await?;
    store.add("Привет мир!").await?;
    println!("vocabulary: {:?}", store.texts().collect::<Vec<_>>());

    store.remove(1_usize)?;
    store.remove("Привет мир!")?;
    println!("after removals: {:?}", store.texts().collect::<Vec<_>>());

    // --- Similarity and confidence ---
    let query = "Привет мир!";
    println!("confidence: {}", store.confidence_score(query).await?);
    println!(
        "present at 0.5: {:?}",
        store.confidence(query, false, 0.5).await?
    );
    println!("most similar: {}", store.similar_text(query).await?);
    println!("most similar position: {}", store.similar(query).await?);

    store.reset_index().await?;

    // --- Persistence ---
    let paths = store.save(Some(Path::new("db.mmp"))).await?;
    println!(
        "saved to {} and {}",
        paths.vocab.display(),
        paths.index.display()
    );
    store.save(None).await?;

    if !store.load(Some(Path::new("db.mmp"))).await {
        println!("load failed, kept the in-memory vocabulary");
    }

    Ok(())
}
