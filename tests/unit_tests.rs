//! Unit tests for the EarthNet toolkit
//!
//! Covers error formatting, configuration, the legacy bundle, the minicube
//! adapter and the gallery renderer on synthetic in-memory data.

use earthnet::adapter::{to_legacy, BANDS, CLOUD_MASK, ELEVATION, WEATHER};
use earthnet::config::{Split, SplitSelection, ToolkitConfig};
use earthnet::legacy::{LegacyCube, HIGHRES_SIZE, MESO_SIZE};
use earthnet::minicube::{Minicube, LAT, LON, TIME};
use earthnet::render::colormap::{lut_index, BAD_COLOR, NO_DATA_COLOR};
use earthnet::render::{
    colorize, cube_gallery, tile, Colormap, CubeInput, GalleryOptions, PlotVariable,
    VegetationMask,
};
use earthnet::score::{class_mean, DatasetScores, LandCover, ScoreRecord};
use earthnet::{EarthNetError, Result};
use ndarray::{Array2, Array3, Array4, ArrayD, IxDyn};
use ndarray_npy::NpzWriter;
use std::fs::File;
use tempfile::tempdir;

/// 128x128 minicube with `frames` daily steps and every variable the adapter reads
fn synthetic_minicube(frames: usize) -> Result<Minicube> {
    let grid = (HIGHRES_SIZE, HIGHRES_SIZE);
    let mut cube = Minicube::new();

    for (b, band) in BANDS.iter().enumerate() {
        let data = ArrayD::from_shape_fn(IxDyn(&[frames, grid.0, grid.1]), |ix| {
            (b as f32 + 1.0) * 0.1 + ix[0] as f32 * 0.001
        });
        cube = cube.with_variable(band, vec![TIME, LAT, LON], data)?;
    }

    // cloudy everywhere on the last day only
    let mask = ArrayD::from_shape_fn(IxDyn(&[frames, grid.0, grid.1]), |ix| {
        if ix[0] == frames - 1 {
            4.0
        } else {
            0.0
        }
    });
    cube = cube.with_variable(CLOUD_MASK, vec![TIME, LAT, LON], mask)?;

    for scaling in WEATHER.iter() {
        let data = ArrayD::from_shape_fn(IxDyn(&[frames]), |ix| ix[0] as f32);
        cube = cube.with_variable(scaling.variable, vec![TIME], data)?;
    }

    let dem = ArrayD::from_elem(IxDyn(&[grid.0, grid.1]), 2000.0);
    cube.with_variable(ELEVATION, vec![LAT, LON], dem)
}

#[test]
fn test_error_types() {
    let err = EarthNetError::VariableNotFound {
        var: "s2_B02".to_string(),
    };
    assert!(format!("{err}").contains("s2_B02"));

    let err = EarthNetError::DimensionNotFound {
        var: "ndvi_pred".to_string(),
        dim: "time".to_string(),
    };
    let message = format!("{err}");
    assert!(message.contains("ndvi_pred"));
    assert!(message.contains("time"));

    let err: EarthNetError = "custom error".into();
    assert!(matches!(err, EarthNetError::Generic(_)));
}

#[test]
fn test_split_selection() {
    let selection: SplitSelection = "iid,ood,iid".parse().unwrap();
    assert_eq!(selection.splits(), vec![Split::Iid, Split::Ood]);

    let all: SplitSelection = "all".parse().unwrap();
    assert_eq!(all.splits().len(), 5);

    let err = "validation".parse::<SplitSelection>().unwrap_err();
    assert!(matches!(err, EarthNetError::InvalidSplit { .. }));
}

#[test]
fn test_default_config_lists_every_split() {
    let config = ToolkitConfig::default();
    for split in Split::ALL {
        let source = config.archive(split).unwrap();
        assert!(source.url.ends_with(split.archive_filename()));
        assert_eq!(source.filename, split.archive_filename());
    }
    assert!(config.dataset_splits("no-such-dataset").is_err());
}

#[test]
fn test_adapter_produces_legacy_layout() -> Result<()> {
    let cube = synthetic_minicube(25)?;
    let bundle = to_legacy(&cube)?;

    let highres = bundle.highresdynamic.as_ref().unwrap();
    assert_eq!(highres.shape(), &[HIGHRES_SIZE, HIGHRES_SIZE, 5, 5]);
    // day 4, 9, 14, 19, 24 survive subsampling
    let first_day = highres[[0, 0, 0, 0]];
    assert!((first_day - (0.1 + 4.0 * 0.001)).abs() < 1e-6);
    let last_day = highres[[0, 0, 0, 4]];
    assert!((last_day - (0.1 + 24.0 * 0.001)).abs() < 1e-6);
    // binarized cloud mask in the last channel
    assert_eq!(highres[[5, 5, 4, 3]], 0.0);
    assert_eq!(highres[[5, 5, 4, 4]], 1.0);

    let highres_static = bundle.highresstatic.as_ref().unwrap();
    assert_eq!(highres_static.shape(), &[HIGHRES_SIZE, HIGHRES_SIZE, 1]);
    assert!((highres_static[[0, 0, 0]] - 1.0).abs() < 1e-6);

    let meso = bundle.mesodynamic.as_ref().unwrap();
    assert_eq!(meso.shape(), &[MESO_SIZE, MESO_SIZE, 5, 5]);
    // eobs_rr on day 9: (9 + 0) / 50
    assert!((meso[[10, 20, 0, 1]] - 9.0 / 50.0).abs() < 1e-6);

    let meso_static = bundle.mesostatic.as_ref().unwrap();
    assert_eq!(meso_static.shape(), &[MESO_SIZE, MESO_SIZE, 1]);
    Ok(())
}

#[test]
fn test_adapter_treats_missing_cloud_mask_as_clear() -> Result<()> {
    // day 9 has no mask information, day 14 is cloudy in the west half
    let mask = ArrayD::from_shape_fn(IxDyn(&[25, HIGHRES_SIZE, HIGHRES_SIZE]), |ix| {
        match ix[0] {
            9 => f32::NAN,
            14 if ix[2] < 64 => 2.0,
            _ => 0.0,
        }
    });
    let cube = synthetic_minicube(25)?.with_variable(CLOUD_MASK, vec![TIME, LAT, LON], mask)?;
    let highres = to_legacy(&cube)?.highresdynamic.unwrap();

    assert_eq!(highres[[0, 0, 4, 1]], 0.0);
    assert_eq!(highres[[0, 0, 4, 2]], 1.0);
    assert_eq!(highres[[0, 100, 4, 2]], 0.0);
    assert!(highres.slice(ndarray::s![.., .., 4, ..]).iter().all(|v| !v.is_nan()));
    Ok(())
}

#[test]
fn test_adapter_rejects_wrong_grid() -> Result<()> {
    let data = ArrayD::zeros(IxDyn(&[25, 64, 64]));
    let cube = Minicube::new().with_variable(BANDS[0], vec![TIME, LAT, LON], data)?;
    assert!(matches!(
        to_legacy(&cube),
        Err(EarthNetError::Shape { .. })
    ));
    Ok(())
}

#[test]
fn test_legacy_npz_roundtrip() -> Result<()> {
    let temp_dir = tempdir()?;
    let path = temp_dir.path().join("nested").join("sample.npz");

    let bundle = to_legacy(&synthetic_minicube(10)?)?;
    bundle.save_npz(&path)?;
    let loaded = LegacyCube::load_npz(&path)?;
    assert_eq!(loaded, bundle);
    Ok(())
}

#[test]
fn test_legacy_missing_arrays() {
    let empty = LegacyCube::default();
    match empty.satellite() {
        Err(EarthNetError::MissingData(message)) => {
            assert_eq!(message, "data does not contain satellite imagery.");
        }
        other => panic!("expected MissingData, got {other:?}"),
    }
    assert!(matches!(empty.meso(), Err(EarthNetError::MissingData(_))));

    let static_only = LegacyCube {
        highresstatic: Some(ArrayD::zeros(IxDyn(&[HIGHRES_SIZE, HIGHRES_SIZE, 1]))),
        ..LegacyCube::default()
    };
    assert_eq!(static_only.satellite().unwrap().shape()[0], HIGHRES_SIZE);
}

#[test]
fn test_gallery_dimensions() {
    let (n, h, w, ncols) = (6, 4, 5, 3);
    let frames = Array4::<f32>::ones((n, h, w, 3));
    let mosaic = tile(&frames, ncols).unwrap();
    assert_eq!(
        mosaic.dim(),
        ((h + 2) * n / ncols, (w + 2) * ncols, 3)
    );
}

#[test]
fn test_colormap_endpoints() {
    let lut = Colormap::Ndvi.lut();
    assert_eq!(lut.len(), 256);
    assert_eq!(lut_index(0.0), Some(0));
    assert_eq!(lut_index(1.0), Some(255));
    assert_eq!(lut_index(-3.0), Some(0));
    assert_eq!(lut_index(f32::NAN), None);

    let values = Array3::from_shape_vec((1, 1, 3), vec![0.0, 1.0, f32::NAN]).unwrap();
    let rgb = colorize(&values, Colormap::Ndvi, None, None);
    for k in 0..3 {
        assert_eq!(rgb[[0, 0, 0, k]], lut[0][k]);
        assert_eq!(rgb[[0, 0, 1, k]], lut[255][k]);
        assert_eq!(rgb[[0, 0, 2, k]], BAD_COLOR[k]);
    }
}

#[test]
fn test_colorize_masks() {
    let values = Array3::from_elem((1, 1, 2), 0.5);
    let red = Array3::from_shape_vec((1, 1, 2), vec![true, true]).unwrap();
    let blue = Array3::from_shape_vec((1, 1, 2), vec![false, true]).unwrap();
    let rgb = colorize(&values, Colormap::Ndvi, Some(&red), Some(&blue));
    for k in 0..3 {
        assert_eq!(rgb[[0, 0, 0, k]], BAD_COLOR[k]);
        // blue overrides red
        assert_eq!(rgb[[0, 0, 1, k]], NO_DATA_COLOR[k]);
    }
}

#[test]
fn test_cube_gallery_rgb_and_ndvi() -> Result<()> {
    let temp_dir = tempdir()?;
    let bundle = to_legacy(&synthetic_minicube(25)?)?;

    let rgb_path = temp_dir.path().join("plots").join("rgb.png");
    let options = GalleryOptions {
        variable: PlotVariable::Rgb,
        ncols: 5,
        save_path: Some(rgb_path.clone()),
        ..GalleryOptions::default()
    };
    let figure = cube_gallery(CubeInput::Bundle(bundle.clone()), &options)?;
    assert_eq!(figure.mosaic.dim(), (HIGHRES_SIZE + 2, (HIGHRES_SIZE + 2) * 5, 3));
    assert!(figure.colorbar.is_none());
    // last frame is cloudy
    let cloudy_x = 4 * (HIGHRES_SIZE + 2) + 10;
    for k in 0..3 {
        assert_eq!(figure.mosaic[[10, cloudy_x, k]], NO_DATA_COLOR[k]);
    }
    let png = std::fs::read(&rgb_path)?;
    assert_eq!(&png[1..4], b"PNG");

    let landcover = ArrayD::from_shape_fn(IxDyn(&[HIGHRES_SIZE, HIGHRES_SIZE]), |ix| {
        if ix[1] < 64 {
            80.0
        } else {
            40.0
        }
    });
    let options = GalleryOptions {
        variable: PlotVariable::Ndvi,
        vegetation_mask: Some(VegetationMask::Array(landcover)),
        ncols: 5,
        ..GalleryOptions::default()
    };
    let figure = cube_gallery(CubeInput::Bundle(bundle), &options)?;
    assert_eq!(figure.colorbar.as_ref().map(|c| c.label.as_str()), Some("NDVI"));
    // land cover 40 is outside the vegetation range
    for k in 0..3 {
        assert_eq!(figure.mosaic[[10, 1 + 100, k]], BAD_COLOR[k]);
    }
    assert_ne!(figure.mosaic[[10, 1 + 10, 1]], BAD_COLOR[1]);
    Ok(())
}

#[test]
fn test_cube_gallery_weather_needs_meso() {
    let bundle = LegacyCube {
        highresdynamic: Some(ArrayD::zeros(IxDyn(&[HIGHRES_SIZE, HIGHRES_SIZE, 5, 10]))),
        ..LegacyCube::default()
    };
    let options = GalleryOptions {
        variable: PlotVariable::Tg,
        ..GalleryOptions::default()
    };
    assert!(matches!(
        cube_gallery(CubeInput::Bundle(bundle), &options),
        Err(EarthNetError::MissingData(_))
    ));
}

#[test]
fn test_cube_gallery_weather_variable() -> Result<()> {
    // channel 0 (rr) stays at 0.0 so reading the wrong channel shows up
    let meso = ArrayD::from_shape_fn(IxDyn(&[MESO_SIZE, MESO_SIZE, 5, 10]), |ix| {
        match ix[2] {
            0 => 0.0,
            2 if ix == IxDyn(&[3, 4, 2, 0]) => f32::NAN,
            2 => 0.5,
            _ => 0.9,
        }
    });
    let bundle = LegacyCube {
        mesodynamic: Some(meso),
        ..LegacyCube::default()
    };
    let options = GalleryOptions {
        variable: PlotVariable::Tg,
        ncols: 5,
        ..GalleryOptions::default()
    };
    let figure = cube_gallery(CubeInput::Bundle(bundle), &options)?;
    assert_eq!(figure.mosaic.dim(), ((MESO_SIZE + 2) * 2, (MESO_SIZE + 2) * 5, 3));

    // missing temperature in the first frame is drawn red
    for k in 0..3 {
        assert_eq!(figure.mosaic[[1 + 3, 1 + 4, k]], BAD_COLOR[k]);
    }
    let lut = Colormap::Coolwarm.lut();
    let mid = lut[lut_index(0.5).unwrap()];
    let low = lut[lut_index(0.0).unwrap()];
    assert_ne!(mid, low);
    let second_row = MESO_SIZE + 2 + 1 + 10;
    for k in 0..3 {
        assert_eq!(figure.mosaic[[1 + 10, 1 + 10, k]], mid[k]);
        assert_eq!(figure.mosaic[[second_row, 1 + 10, k]], mid[k]);
    }

    let colorbar = figure.colorbar.as_ref().unwrap();
    assert_eq!(colorbar.colormap, Colormap::Coolwarm);
    assert_eq!((colorbar.vmin, colorbar.vmax), (-50.0, 50.0));
    assert_eq!(colorbar.label, "Mean temperature in °C");
    Ok(())
}

#[test]
fn test_cube_gallery_from_files() -> Result<()> {
    let temp_dir = tempdir()?;
    let cube_path = temp_dir.path().join("29SND").join("sample.npz");
    to_legacy(&synthetic_minicube(25)?)?.save_npz(&cube_path)?;

    let landcover = Array2::from_shape_fn((HIGHRES_SIZE, HIGHRES_SIZE), |(_, x)| {
        if x < 64 {
            80.0_f32
        } else {
            40.0
        }
    });
    let mask_path = temp_dir.path().join("landcover.npz");
    let mut npz = NpzWriter::new(File::create(&mask_path)?);
    npz.add_array("landcover", &landcover)?;
    npz.finish()?;

    let png_path = temp_dir.path().join("ndvi.png");
    let options = GalleryOptions {
        variable: PlotVariable::Ndvi,
        vegetation_mask: Some(VegetationMask::Path(mask_path)),
        ncols: 5,
        save_path: Some(png_path.clone()),
        ..GalleryOptions::default()
    };
    let figure = cube_gallery(CubeInput::Path(cube_path), &options)?;
    assert_eq!(figure.mosaic.dim(), (HIGHRES_SIZE + 2, (HIGHRES_SIZE + 2) * 5, 3));
    for k in 0..3 {
        assert_eq!(figure.mosaic[[10, 1 + 100, k]], BAD_COLOR[k]);
    }
    assert_ne!(figure.mosaic[[10, 1 + 10, 1]], BAD_COLOR[1]);
    // the last frame is cloudy, and blue wins over red
    let cloudy_x = 4 * (HIGHRES_SIZE + 2) + 1 + 100;
    for k in 0..3 {
        assert_eq!(figure.mosaic[[10, cloudy_x, k]], NO_DATA_COLOR[k]);
    }
    assert!(png_path.is_file());

    let missing = GalleryOptions {
        vegetation_mask: Some(VegetationMask::Path(temp_dir.path().join("none.npz"))),
        ..options
    };
    let cube_path = temp_dir.path().join("29SND").join("sample.npz");
    assert!(cube_gallery(CubeInput::Path(cube_path), &missing).is_err());
    Ok(())
}

#[test]
fn test_plot_variable_parsing() {
    for variable in PlotVariable::ALL {
        assert_eq!(variable.as_str().parse::<PlotVariable>().unwrap(), variable);
    }
    assert!(matches!(
        "ndwi".parse::<PlotVariable>(),
        Err(EarthNetError::InvalidVariable { .. })
    ));
}

fn record(landcover: f64, nnse: f64) -> ScoreRecord {
    ScoreRecord {
        id: "29SND_2017-06-10_2017-11-06_2105_2233_3641_3769_32_112_56_136".to_string(),
        lat: 37.1,
        lon: -7.8,
        nnse,
        landcover,
    }
}

#[test]
fn test_dataset_scores_aggregate_by_land_cover() -> Result<()> {
    let records = vec![
        record(10.0, 0.8),
        record(10.0, 0.6),
        record(10.0, f64::NAN),
        record(20.0, 0.5),
        record(30.0, f64::NAN),
        record(40.0, 0.4),
        record(40.0, 0.2),
        record(90.0, 0.9),
        record(95.0, 0.1),
        record(100.0, 0.25),
        // not a class code, but still low vegetation
        record(10.5, 0.0),
        // unknown land cover never counts as vegetation
        record(f64::NAN, 1.0),
    ];
    let close = |a: f64, b: f64| (a - b).abs() < 1e-12;

    assert!(close(class_mean(&records, LandCover::Tree), 0.7));
    let scores = DatasetScores::from_records(records);
    assert!(close(scores.tree_score, 0.7));
    assert!(close(scores.shrub_score, 0.5));
    assert!(scores.grass_score.is_nan());
    assert!(close(scores.crop_score, 0.3));
    assert!(close(scores.swamp_score, 0.9));
    assert!(close(scores.mangroves_score, 0.1));
    assert!(close(scores.moss_score, 0.25));
    // tree 0.8, 0.6, shrub 0.5 and the 10.5 pixel at 0.0
    assert!(close(scores.veg_micro_score, 0.475));
    // grass is undefined, so only tree and shrub enter the macro mean
    assert!(close(scores.veg_macro_score, 0.6));
    assert_eq!(scores.all_scores.len(), 12);

    let summary = scores.summary_json()?;
    assert!(summary.contains("\"grass_score\": null"));
    assert!(!summary.contains("all_scores"));
    Ok(())
}
