use crate::image_mse::Heatmap;
use crate::table::Table;
use anyhow::Context;
use plotters::prelude::*;

// plotters' `Copper` is a different ramp than matplotlib's
/// matplotlib's `copper` colormap
pub fn copper(t: f64) -> RGBColor {
    let t = t.clamp(0., 1.);
    let r = (1.25 * t).min(1.);
    let g = 0.7812 * t;
    let b = 0.4975 * t;
    RGBColor((r * 255.) as u8, (g * 255.) as u8, (b * 255.) as u8)
}

/// viridis color of a unit value, NaN maps to the low end
pub fn viridis(t: f32) -> [u8; 3] {
    let t = if t.is_nan() { 0. } else { t.clamp(0., 1.) };
    let c = ViridisRGB::get_color(t);
    [c.0, c.1, c.2]
}

pub struct TimingPlot<'a> {
    pub x_desc: &'a str,
    pub y_desc: &'a str,
    /// upper end of the x axis, defaults to the largest index
    pub x_max: Option<f64>,
    /// labelled positions on the x axis
    pub x_ticks: Vec<f64>,
}

/// one line per table column against the index, y axis starting at zero
pub fn plot_timing<PATH: AsRef<std::path::Path>>(
    table: &Table,
    style: &TimingPlot,
    path: PATH,
) -> anyhow::Result<()> {
    let path = path.as_ref();
    let x_max = style
        .x_max
        .or_else(|| table.index.iter().copied().reduce(f64::max))
        .unwrap_or(1.)
        .max(1.);
    let y_max = table.max_value().unwrap_or(1.).max(1.) * 1.05;
    let root = SVGBackend::new(path, (640, 480)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(
            (0f64..x_max).with_key_points(style.x_ticks.clone()),
            0f64..y_max,
        )?;
    chart
        .configure_mesh()
        .light_line_style(&RGBColor(211, 211, 211).mix(0.6))
        .bold_line_style(&RGBColor(211, 211, 211))
        .x_labels(style.x_ticks.len())
        .x_label_formatter(&|x| format!("{}", x))
        .x_desc(style.x_desc)
        .y_desc(style.y_desc)
        .draw()?;
    let num_series = table.columns.len();
    for (i_series, (name, points)) in table.series().enumerate() {
        let t = if num_series > 1 {
            i_series as f64 / (num_series - 1) as f64
        } else {
            0.
        };
        let color = copper(t);
        chart
            .draw_series(LineSeries::new(points, color.stroke_width(2)))?
            .label(name)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }
    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    root.present()
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// writes the heatmap as a PNG with the viridis colormap
pub fn write_heatmap<PATH: AsRef<std::path::Path>>(
    heatmap: &Heatmap,
    path: PATH,
) -> anyhow::Result<()> {
    let path = path.as_ref();
    let img_shape = heatmap.img_shape;
    anyhow::ensure!(
        heatmap.data.len() == img_shape.0 * img_shape.1,
        "heatmap has {} values for {}x{} pixels",
        heatmap.data.len(),
        img_shape.0,
        img_shape.1
    );
    let pix2rgb: Vec<[u8; 3]> = heatmap.data.iter().map(|&v| viridis(v)).collect();
    use ::slice_of_array::SliceFlatExt; // for flat
    let img = image::RgbImage::from_raw(
        img_shape.0 as u32,
        img_shape.1 as u32,
        pix2rgb.flat().to_vec(),
    )
    .context("heatmap buffer too small")?;
    img.save(path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

#[test]
fn test_colormaps() {
    assert_eq!(copper(0.), RGBColor(0, 0, 0));
    assert_eq!(copper(1.), RGBColor(255, 199, 126));
    assert_eq!(viridis(0.), [68, 1, 84]);
    assert_eq!(viridis(1.), [253, 231, 37]);
    assert_eq!(viridis(0.5), [35, 145, 140]);
    assert_eq!(viridis(2.), [254, 232, 37]);
    assert_eq!(viridis(f32::NAN), [68, 1, 84]);
}

#[test]
fn test_plot_timing() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let mut table = Table::new("samples", vec![1., 32., 64.]);
    table.push_column("color heuristic", vec![10.0, 12.5, 15.0])?;
    table.push_column("depth euler heuristic", vec![11.0, 20.0, 31.0])?;
    let path = tmp.path().join("samples_plot.svg");
    plot_timing(
        &table,
        &TimingPlot {
            x_desc: "number of samples per ray",
            y_desc: "mean render time [ms]",
            x_max: Some(256.),
            x_ticks: (0..8).map(|i| (i * 32) as f64).collect(),
        },
        &path,
    )?;
    let svg = std::fs::read_to_string(&path)?;
    assert!(svg.contains("<svg"));
    assert!(svg.contains("depth euler heuristic"));
    for tick in ["32", "96", "224"] {
        assert!(svg.contains(&format!(">{}<", tick)), "no x tick at {}", tick);
    }
    assert!(!svg.contains(">50<"));
    Ok(())
}

#[test]
fn test_write_heatmap() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("heatmap_color.png");
    let heatmap = Heatmap {
        img_shape: (3, 2),
        data: vec![0., 0.5, 1., 0., 0., 0.],
    };
    write_heatmap(&heatmap, &path)?;
    let img = image::open(&path)?.to_rgb8();
    assert_eq!(img.dimensions(), (3, 2));
    assert_eq!(img.get_pixel(2, 0).0, [254, 232, 37]);
    assert_eq!(img.get_pixel(0, 1).0, [68, 1, 84]);
    Ok(())
}
