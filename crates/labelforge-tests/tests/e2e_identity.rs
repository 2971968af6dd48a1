//! Identity release: no transforms, originals only.

use labelforge_cli::{MemoryStore, ReleasePipeline, ReleaseStore};
use labelforge_core::{ExportFormat, ReleaseConfig, ReleaseStatus, SplitSection, TaskType};
use labelforge_tests::*;

#[test]
fn identity_release_emits_originals_with_exact_labels() {
    let root = tempfile::tempdir().unwrap();
    let store = MemoryStore::new();

    for id in ["img-1", "img-2"] {
        seed_image(
            &store,
            root.path(),
            id,
            "street",
            300,
            200,
            SplitSection::Train,
            vec![bbox(50.0, 60.0, 200.0, 180.0, "car")],
        );
    }

    let config = ReleaseConfig::builder("identity-v1", "proj-1", TaskType::ObjectDetection)
        .dataset("street")
        .export_format(ExportFormat::YoloDetection)
        .images_per_original(1)
        .include_original(true)
        .seed(7)
        .build();

    let pipeline = ReleasePipeline::new(store, root.path());
    let release_id = pipeline.generate_release(&config, "v1.0").unwrap();

    let release = pipeline.store().get_release(&release_id).unwrap().unwrap();
    assert_eq!(release.status, ReleaseStatus::Completed);
    assert_eq!(release.total_original_images, 2);
    assert_eq!(release.total_augmented_images, 0);
    assert_eq!(release.final_image_count, 2);
    assert_eq!(release.train_image_count, 2);
    assert_eq!(release.val_image_count, 0);
    assert_eq!(release.class_count, 1);

    let zip_path = root.path().join(release.model_path.as_ref().unwrap());
    assert!(zip_path.exists(), "zip at {}", zip_path.display());
    let mut archive = open_zip(&zip_path);
    let names = zip_names(&mut archive);

    let images: Vec<_> = names
        .iter()
        .filter(|n| n.starts_with("images/train/"))
        .collect();
    assert_eq!(images.len(), 2);
    let labels: Vec<_> = names
        .iter()
        .filter(|n| n.starts_with("labels/train/") && n.ends_with(".txt"))
        .collect();
    assert_eq!(labels.len(), 2);

    for label in ["labels/train/street_img-1.txt", "labels/train/street_img-2.txt"] {
        let text = read_zip_text(&mut archive, label);
        let lines = parse_yolo_lines(&text);
        assert_eq!(lines.len(), 1, "one label line in {}", label);
        // cx = 125/300, cy = 120/200, w = 150/300, h = 120/200
        let line = &lines[0];
        assert_eq!(line[0], 0.0);
        assert!((line[1] - 125.0 / 300.0).abs() < 1e-6);
        assert!((line[2] - 120.0 / 200.0).abs() < 1e-6);
        assert!((line[3] - 150.0 / 300.0).abs() < 1e-6);
        assert!((line[4] - 120.0 / 200.0).abs() < 1e-6);
    }

    // data.yaml agrees with the release record
    let yaml = read_zip_text(&mut archive, "data.yaml");
    assert!(yaml.contains("nc: 1"));
    assert!(yaml.contains("- car"));

    // release_config.json split counts match the record
    let doc = read_release_config(&mut archive);
    assert_eq!(doc.dataset_stats.train_images, release.train_image_count);
    assert_eq!(doc.dataset_stats.val_images, release.val_image_count);
    assert_eq!(doc.dataset_stats.test_images, release.test_image_count);
    assert_eq!(doc.classes, vec!["car"]);

    // staging tree is gone after packaging
    let staging = root
        .path()
        .join("projects/proj-1/releases")
        .join(&release_id)
        .join("staging");
    assert!(!staging.exists());
}
