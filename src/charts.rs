use plotters::prelude::*;
use std::fs;
use std::path::Path;

/// Value range covering every balance and zero, padded so lines do not touch the frame
fn balance_range(balance_history: &[Vec<f64>]) -> (f64, f64) {
    let (min, max) = balance_history.iter()
        .flatten()
        .fold((0.0f64, 0.0f64), |(min, max), &balance| (min.min(balance), max.max(balance)));
    let padding = ((max - min) * 0.05).max(1.0);
    (min - padding, max + padding)
}

/// Draw the balance of every bidder over the completed rounds, one line per bidder,
/// with a dashed line marking zero balance
pub fn generate_balance_chart(balance_history: &[Vec<f64>], bidder_names: &[String], title: &str, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if balance_history.is_empty() {
        return Err("No bidders to chart".into());
    }
    let num_rounds = balance_history.iter().map(Vec::len).max().unwrap_or(0);
    if num_rounds == 0 {
        return Err("No completed rounds to chart".into());
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let (min_balance, max_balance) = balance_range(balance_history);

    let root = BitMapBackend::new(path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 30).into_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0usize..num_rounds, min_balance..max_balance)?;

    chart.configure_mesh()
        .x_desc("Auction Round")
        .y_desc("Balance ($)")
        .draw()?;

    for (bidder_index, history) in balance_history.iter().enumerate() {
        let color = Palette99::pick(bidder_index).to_rgba();
        let label = bidder_names.get(bidder_index)
            .cloned()
            .unwrap_or_else(|| format!("Bidder {}", bidder_index));
        chart.draw_series(LineSeries::new(
            history.iter().enumerate().map(|(round, &balance)| (round, balance)),
            color.stroke_width(2),
        ))?
        .label(label)
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &color));
    }

    // Dashed zero line, drawn as short segments
    let dash = (num_rounds / 100).max(1);
    chart.draw_series(
        (0..num_rounds).step_by(dash * 2).map(|start| {
            PathElement::new(vec![(start, 0.0), ((start + dash).min(num_rounds), 0.0)], RED.stroke_width(1))
        }),
    )?
    .label("Zero Balance")
    .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &RED));

    chart.configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}
