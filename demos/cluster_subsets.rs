//! Cluster a small 2D dataset and expose every cluster as a subset group.

use cluster_subsets::{
    AxisSlice, Data, DataCollection, KMeans, ModelConfig, View, fit_and_create_clusters,
};
use ndarray::array;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    // Three well-separated groups.
    let mut data = Data::new("points");
    data.add_component(
        "x",
        array![0.0, 0.1, 0.2, 5.0, 5.1, 4.9, 10.0, 10.1, 9.9].into_dyn(),
    )?;
    data.add_component(
        "y",
        array![0.0, 0.2, 0.1, 5.0, 4.9, 5.1, 0.0, 0.1, -0.1].into_dyn(),
    )?;

    let mut collection = DataCollection::new();
    collection.append(data);

    let model = fit_and_create_clusters(
        &mut collection,
        "points",
        &["x", "y"],
        || KMeans::new(3).random_state(42),
        None,
        ModelConfig::default(),
    )?;
    println!("=== {} clusters over {:?} ===", model.n_clusters(), model.attributes());

    let points = collection.get("points")?;
    for group in collection.subset_groups() {
        let mask = group.to_mask(&*points, None)?;
        println!("{:>10}: {:?}", group.label(), mask.as_slice().unwrap_or_default());
    }

    // Only the first three points.
    let view = View::Slice(vec![AxisSlice::new(0, 3)]);
    if let Some(group) = collection.subset_group("cluster_0") {
        let mask = group.to_mask(&*points, Some(&view))?;
        println!("cluster_0 within the first three points: {mask}");
    }

    let stats = model.cache_stats();
    println!(
        "prediction cache: {} hits, {} misses, {} entries",
        stats.hits, stats.misses, stats.size
    );

    Ok(())
}
