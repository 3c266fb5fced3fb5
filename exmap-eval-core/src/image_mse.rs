use anyhow::Context;
use num_traits::AsPrimitive;
use tracing::{debug, info};

/// regular files in `dir` (symlinks followed), sorted by file name
pub fn list_images<PATH: AsRef<std::path::Path>>(
    dir: PATH,
) -> anyhow::Result<Vec<std::path::PathBuf>> {
    let dir = dir.as_ref();
    let mut files = vec![];
    for entry in
        std::fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

fn to_unit<T: AsPrimitive<f32>>(data: &[T], max: f32) -> Vec<f32> {
    data.iter().map(|&v| v.as_() / max).collect()
}

/// channel values scaled to `[0, 1]`, interleaved, and the number of channels
pub fn unit_channels(img: &image::DynamicImage) -> (Vec<f32>, usize) {
    use image::DynamicImage;
    match img {
        DynamicImage::ImageLuma8(b) => (to_unit(b.as_raw(), 255.), 1),
        DynamicImage::ImageLumaA8(b) => (to_unit(b.as_raw(), 255.), 2),
        DynamicImage::ImageRgb8(b) => (to_unit(b.as_raw(), 255.), 3),
        DynamicImage::ImageRgba8(b) => (to_unit(b.as_raw(), 255.), 4),
        DynamicImage::ImageLuma16(b) => (to_unit(b.as_raw(), 65535.), 1),
        DynamicImage::ImageLumaA16(b) => (to_unit(b.as_raw(), 65535.), 2),
        DynamicImage::ImageRgb16(b) => (to_unit(b.as_raw(), 65535.), 3),
        DynamicImage::ImageRgba16(b) => (to_unit(b.as_raw(), 65535.), 4),
        DynamicImage::ImageRgb32F(b) => (b.as_raw().clone(), 3),
        DynamicImage::ImageRgba32F(b) => (b.as_raw().clone(), 4),
        _ => (img.to_rgba32f().into_raw(), 4),
    }
}

/// squared difference of one image pair
pub struct PairError {
    pub img_shape: (usize, usize),
    pub num_channel: usize,
    /// per channel, interleaved like the source pixels
    pub diff: Vec<f32>,
    /// sum of `diff` over the number of pixels
    pub mse: f64,
}

pub fn pair_squared_error(
    gt: &image::DynamicImage,
    novel: &image::DynamicImage,
) -> anyhow::Result<PairError> {
    let img_shape = (gt.width() as usize, gt.height() as usize);
    anyhow::ensure!(
        img_shape == (novel.width() as usize, novel.height() as usize),
        "image sizes differ: {}x{} vs {}x{}",
        img_shape.0,
        img_shape.1,
        novel.width(),
        novel.height()
    );
    let (gt, num_channel) = unit_channels(gt);
    let (novel, num_channel_novel) = unit_channels(novel);
    anyhow::ensure!(
        num_channel == num_channel_novel,
        "channel counts differ: {} vs {}",
        num_channel,
        num_channel_novel
    );
    let diff: Vec<f32> = gt
        .iter()
        .zip(novel.iter())
        .map(|(&a, &b)| (a - b) * (a - b))
        .collect();
    let err: f64 = diff.iter().map(|&v| v as f64).sum();
    let num_pix = img_shape.0 * img_shape.1;
    Ok(PairError {
        img_shape,
        num_channel,
        diff,
        mse: if num_pix == 0 { 0. } else { err / num_pix as f64 },
    })
}

/// accumulated squared error per pixel, normalized to `[0, 1]`
#[derive(Clone, Debug)]
pub struct Heatmap {
    pub img_shape: (usize, usize),
    /// row major, `img_shape.0 * img_shape.1` values
    pub data: Vec<f32>,
}

pub struct FolderMse {
    /// per-image MSE averaged over all pairs
    pub mse: f64,
    pub heatmap: Heatmap,
    pub num_pair: usize,
}

pub fn open_image(path: &std::path::Path) -> anyhow::Result<image::DynamicImage> {
    image::ImageReader::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?
        .with_guessed_format()?
        .decode()
        .with_context(|| format!("failed to decode {}", path.display()))
}

/// compares the images of two folders, paired by their position in file name order
pub fn folder_mse<PATH0, PATH1>(gt_dir: PATH0, novel_dir: PATH1) -> anyhow::Result<FolderMse>
where
    PATH0: AsRef<std::path::Path>,
    PATH1: AsRef<std::path::Path>,
{
    let gt_files = list_images(&gt_dir)?;
    let novel_files = list_images(&novel_dir)?;
    anyhow::ensure!(
        gt_files.len() == novel_files.len(),
        "{} has {} images but {} has {}",
        gt_dir.as_ref().display(),
        gt_files.len(),
        novel_dir.as_ref().display(),
        novel_files.len()
    );
    anyhow::ensure!(
        !gt_files.is_empty(),
        "no images in {}",
        gt_dir.as_ref().display()
    );
    let num_pair = gt_files.len();
    let mut overall: Option<(PairError, Vec<f64>)> = None;
    let mut sum_mse = 0f64;
    for (i_pair, (gt_path, novel_path)) in gt_files.iter().zip(novel_files.iter()).enumerate() {
        debug!(
            "{}/{}: {} vs {}",
            i_pair + 1,
            num_pair,
            gt_path.display(),
            novel_path.display()
        );
        let gt = open_image(gt_path)?;
        let novel = open_image(novel_path)?;
        let pair = pair_squared_error(&gt, &novel)
            .with_context(|| format!("comparing {}", gt_path.display()))?;
        sum_mse += pair.mse;
        match overall.as_mut() {
            None => {
                let acc = pair.diff.iter().map(|&v| v as f64).collect();
                overall = Some((pair, acc));
            }
            Some((first, acc)) => {
                anyhow::ensure!(
                    first.img_shape == pair.img_shape && first.num_channel == pair.num_channel,
                    "{} does not match the layout of the first image",
                    gt_path.display()
                );
                acc.iter_mut()
                    .zip(pair.diff.iter())
                    .for_each(|(a, &d)| *a += d as f64);
            }
        }
    }
    let (first, acc) = overall.context("no image pairs compared")?;
    let heatmap = heatmap_from_channels(&acc, first.img_shape, first.num_channel);
    let mse = sum_mse / num_pair as f64;
    info!(
        "compared {} image pairs of {}, mse {}",
        num_pair,
        novel_dir.as_ref().display(),
        mse
    );
    Ok(FolderMse {
        mse,
        heatmap,
        num_pair,
    })
}

/// sums the channels of every pixel and divides by the largest sum
pub fn heatmap_from_channels(
    acc: &[f64],
    img_shape: (usize, usize),
    num_channel: usize,
) -> Heatmap {
    let sums: Vec<f64> = acc
        .chunks(num_channel)
        .map(|pix| pix.iter().sum::<f64>())
        .collect();
    let max = sums.iter().copied().fold(0f64, f64::max);
    let data = if max > 0. {
        sums.iter().map(|&v| (v / max) as f32).collect()
    } else {
        vec![0f32; sums.len()]
    };
    Heatmap { img_shape, data }
}

#[cfg(test)]
fn random_rgb_image(seed: u64, img_shape: (u32, u32)) -> image::RgbImage {
    use rand::{Rng, SeedableRng};
    let mut reng = rand_chacha::ChaCha8Rng::seed_from_u64(seed);
    image::RgbImage::from_fn(img_shape.0, img_shape.1, |_, _| {
        image::Rgb([reng.random::<u8>(), reng.random::<u8>(), reng.random::<u8>()])
    })
}

#[test]
fn test_pair_squared_error() -> anyhow::Result<()> {
    let gt = image::RgbImage::from_pixel(4, 2, image::Rgb([255, 255, 255]));
    let mut novel = gt.clone();
    novel.put_pixel(1, 0, image::Rgb([0, 255, 255]));
    novel.put_pixel(3, 1, image::Rgb([0, 0, 255]));
    let pair = pair_squared_error(
        &image::DynamicImage::ImageRgb8(gt),
        &image::DynamicImage::ImageRgb8(novel),
    )?;
    assert_eq!(pair.img_shape, (4, 2));
    assert_eq!(pair.num_channel, 3);
    // three fully wrong channels over eight pixels
    assert!((pair.mse - 3.0 / 8.0).abs() < 1.0e-9);
    assert_eq!(pair.diff[3], 1.0);
    assert_eq!(pair.diff[4], 0.0);
    Ok(())
}

#[test]
fn test_pair_layout_mismatch() {
    let a = image::DynamicImage::ImageRgb8(image::RgbImage::new(4, 4));
    let b = image::DynamicImage::ImageRgb8(image::RgbImage::new(4, 3));
    let c = image::DynamicImage::ImageRgba8(image::RgbaImage::new(4, 4));
    assert!(pair_squared_error(&a, &b).is_err());
    assert!(pair_squared_error(&a, &c).is_err());
}

#[test]
fn test_folder_mse() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let gt_dir = tmp.path().join("gt");
    let novel_dir = tmp.path().join("novel_c");
    std::fs::create_dir_all(&gt_dir)?;
    std::fs::create_dir_all(&novel_dir)?;
    let img_shape = (8u32, 6u32);
    for i in 0..3 {
        let gt = random_rgb_image(i, img_shape);
        gt.save(gt_dir.join(format!("{i:03}.png")))?;
        let mut novel = gt.clone();
        // differ only in the red channel of the pixel (2, 1), more for later frames
        let p = novel.get_pixel_mut(2, 1);
        p[0] = if p[0] > 127 { 0 } else { 255 };
        if i == 0 {
            novel = gt.clone();
        }
        novel.save(novel_dir.join(format!("frame_{i:03}.png")))?;
    }
    std::fs::create_dir_all(gt_dir.join("subdir"))?;
    let res = folder_mse(&gt_dir, &novel_dir)?;
    assert_eq!(res.num_pair, 3);
    assert_eq!(res.heatmap.img_shape, (8, 6));
    assert_eq!(res.heatmap.data.len(), 48);
    let i_pix = 1 * 8 + 2;
    assert_eq!(res.heatmap.data[i_pix], 1.0);
    assert!(res
        .heatmap
        .data
        .iter()
        .enumerate()
        .all(|(i, &v)| i == i_pix || v == 0.0));
    assert!(res.mse > 0.0);
    assert!(res.mse < 2.0 / 48.0);
    Ok(())
}

#[test]
fn test_folder_mse_count_mismatch() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let gt_dir = tmp.path().join("gt");
    let novel_dir = tmp.path().join("novel_d");
    std::fs::create_dir_all(&gt_dir)?;
    std::fs::create_dir_all(&novel_dir)?;
    random_rgb_image(0, (4, 4)).save(gt_dir.join("0.png"))?;
    random_rgb_image(1, (4, 4)).save(gt_dir.join("1.png"))?;
    random_rgb_image(0, (4, 4)).save(novel_dir.join("0.png"))?;
    assert!(folder_mse(&gt_dir, &novel_dir).is_err());
    let empty = tmp.path().join("empty");
    std::fs::create_dir_all(&empty)?;
    assert!(folder_mse(&empty, &empty).is_err());
    Ok(())
}

#[test]
fn test_heatmap_all_zero() {
    let heatmap = heatmap_from_channels(&[0.; 12], (2, 2), 3);
    assert_eq!(heatmap.data, vec![0.; 4]);
    let heatmap = heatmap_from_channels(&[0., 1., 1., 0.5, 0., 0.], (2, 1), 3);
    assert_eq!(heatmap.data, vec![1.0, 0.25]);
}

#[cfg(unix)]
#[test]
fn test_list_images_follows_symlinks() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let store = tmp.path().join("store");
    let novel_dir = tmp.path().join("novel_da");
    std::fs::create_dir_all(&store)?;
    std::fs::create_dir_all(&novel_dir)?;
    random_rgb_image(3, (4, 4)).save(store.join("a.png"))?;
    std::os::unix::fs::symlink(store.join("a.png"), novel_dir.join("0.png"))?;
    std::os::unix::fs::symlink(tmp.path().join("missing.png"), novel_dir.join("1.png"))?;
    std::os::unix::fs::symlink(&store, novel_dir.join("2"))?;
    let files = list_images(&novel_dir)?;
    assert_eq!(files, vec![novel_dir.join("0.png")]);
    let res = folder_mse(&store, &novel_dir)?;
    assert_eq!(res.num_pair, 1);
    assert_eq!(res.mse, 0.0);
    Ok(())
}
