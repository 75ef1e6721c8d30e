/// 定位流程测试
///
/// 覆盖经验 KNN / NN、模型 KNN 的不可听填充、k 的边界检查、
/// 估计文件往返以及完整的 生成 -> 定位 -> 评分 流程

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use std::fs;
    use wifinav::algorithms::*;
    use wifinav::config::RunConfig;
    use wifinav::error::DatasetPool;
    use wifinav::generator::{DatasetGenerator, GeneratorConfig};
    use wifinav::io::{read_estimates, write_estimates};
    use wifinav::positioning::{score_file, Method, PositioningPipeline};
    use wifinav::trace::{write_trace_file, TraceEntry};
    use wifinav::NavError;

    const AP_A: AccessPointId = AccessPointId::new([0xaa; 6]);
    const AP_B: AccessPointId = AccessPointId::new([0xbb; 6]);

    fn entry(position: GeoPosition, timestamp: i64, readings: &[(AccessPointId, f64)]) -> TraceEntry {
        let mut samples = SignalAggregate::new();
        for &(id, strength) in readings {
            samples.put(id, strength, Some(1.0));
        }
        TraceEntry::new(timestamp, AccessPointId::new([0; 6]), position, samples)
    }

    fn repeated(position: GeoPosition, count: usize, first: i64, readings: &[(AccessPointId, f64)]) -> Vec<TraceEntry> {
        (0..count).map(|i| entry(position, first + i as i64, readings)).collect()
    }

    /// P=(0,0,0) 离线 10 条 -50 dBm，Q=(1,0,0) 在线 5 条 -55 dBm
    fn single_position_scenario() -> (Vec<TraceEntry>, Vec<TraceEntry>) {
        let offline = repeated(GeoPosition::new(0.0, 0.0, 0.0), 10, 0, &[(AP_A, -50.0)]);
        let online = repeated(GeoPosition::new(1.0, 0.0, 0.0), 5, 100, &[(AP_A, -55.0)]);
        (offline, online)
    }

    /// 三个离线位置，强度随 x 变化
    fn corridor() -> (Vec<TraceEntry>, Vec<TraceEntry>) {
        let mut offline = Vec::new();
        for (i, x) in [0.0, 5.0, 10.0].iter().enumerate() {
            let strength_a = -40.0 - 3.0 * x;
            let strength_b = -70.0 + 2.0 * x;
            offline.extend(repeated(
                GeoPosition::new(*x, 0.0, 0.0),
                4,
                i as i64 * 10,
                &[(AP_A, strength_a), (AP_B, strength_b)],
            ));
        }
        let mut online = repeated(GeoPosition::new(1.0, 0.0, 0.0), 2, 100, &[(AP_A, -43.0), (AP_B, -68.0)]);
        online.extend(repeated(GeoPosition::new(9.0, 1.0, 0.0), 2, 200, &[(AP_A, -66.0), (AP_B, -52.0)]));
        (offline, online)
    }

    #[test]
    fn test_concrete_scenario_knn_and_score() {
        let (offline_pool, online_pool) = single_position_scenario();
        let config = GeneratorConfig {
            offline_size: 10,
            online_size: 5,
            ..GeneratorConfig::default()
        };
        let mut generator = DatasetGenerator::with_seed(config, 99).unwrap();
        let dataset = generator.generate(&offline_pool, &online_pool).unwrap();

        let estimates = FingerprintAlgorithm::empirical_knn(&dataset.offline, &dataset.online, 1).unwrap();
        assert_eq!(estimates.len(), 1);
        let estimate = &estimates.all()[0];
        assert_eq!(estimate.estimated.coordinates(), (0.0, 0.0, 0.0));
        assert_eq!(estimate.true_position.coordinates(), (1.0, 0.0, 0.0));

        let dir = tempfile::tempdir().unwrap();
        let estimates_path = dir.path().join("knn_output.txt");
        let score_path = dir.path().join("score.txt");
        write_estimates(&estimates_path, &estimates).unwrap();
        assert_eq!(
            fs::read_to_string(&estimates_path).unwrap(),
            "True=1.0,0.0,0.0;Est=0.0,0.0,0.0"
        );

        let summary = score_file(&estimates_path, &score_path).unwrap();
        assert_eq!(fs::read_to_string(&score_path).unwrap(), "err=1.0;percentage=1.0");
        assert_eq!(summary.mean, 1.0);
        println!("评分: {}", summary);
    }

    #[test]
    fn test_knn_with_k_one_matches_nearest_neighbour() {
        let (offline, online) = corridor();
        let knn = FingerprintAlgorithm::empirical_knn(&offline, &online, 1).unwrap();
        let nn = FingerprintAlgorithm::empirical_nn(&offline, &online).unwrap();
        assert_eq!(knn.pairs(), nn.pairs());

        // 显式最近邻搜索
        let offline_map = FingerprintAlgorithm::joint_fingerprints(&offline);
        let online_map = FingerprintAlgorithm::joint_fingerprints(&online);
        for fp in online_map.iter() {
            let mut best: Option<(f64, GeoPosition)> = None;
            for candidate in offline_map.iter() {
                let d = FingerprintAlgorithm::fingerprint_distance(&fp.aggregate, &candidate.aggregate).unwrap();
                if best.map_or(true, |(bd, _)| d < bd) {
                    best = Some((d, candidate.position));
                }
            }
            let (_, expected) = best.unwrap();
            let found = nn.get(&fp.position).unwrap();
            assert_eq!((found.estimated.x(), found.estimated.y()), (expected.x(), expected.y()));
        }

        assert_eq!(nn.get(&GeoPosition::new(1.0, 0.0, 0.0)).unwrap().estimated.x(), 0.0);
        assert_eq!(nn.get(&GeoPosition::new(9.0, 1.0, 0.0)).unwrap().estimated.x(), 10.0);
    }

    #[test]
    fn test_knn_averages_neighbours() {
        let (offline, online) = corridor();
        let knn = FingerprintAlgorithm::empirical_knn(&offline, &online, 3).unwrap();
        for estimate in knn.iter() {
            assert_abs_diff_eq!(estimate.estimated.x(), 5.0, epsilon = 1e-12);
            assert_eq!(estimate.estimated.y(), 0.0);
            assert_eq!(estimate.neighbor_count, 3);
        }
    }

    #[test]
    fn test_degenerate_cluster_returns_exact_coordinate() {
        let spot = GeoPosition::new(2.5, -1.25, 0.0);
        let neighbors = vec![
            Neighbor::new(spot, 0.1),
            Neighbor::new(spot, 0.2),
            Neighbor::new(spot, 0.3),
        ];
        let estimate = FingerprintAlgorithm::average_neighbors(&neighbors, 3).unwrap();
        assert_eq!((estimate.x(), estimate.y()), (2.5, -1.25));
    }

    #[test]
    fn test_invalid_k() {
        let (offline, online) = corridor();
        assert!(matches!(
            FingerprintAlgorithm::empirical_knn(&offline, &online, 0),
            Err(NavError::InvalidArgument(_))
        ));
        assert!(matches!(
            FingerprintAlgorithm::empirical_knn(&offline, &online, 4),
            Err(NavError::InvalidArgument(_))
        ));
        assert!(FingerprintAlgorithm::empirical_knn(&offline, &online, 3).is_ok());
    }

    #[test]
    fn test_empty_fingerprint_sets() {
        let (offline, online) = corridor();
        assert!(matches!(
            FingerprintAlgorithm::empirical_knn(&[], &online, 1),
            Err(NavError::EmptyFingerprints(DatasetPool::Offline))
        ));
        assert!(matches!(
            FingerprintAlgorithm::empirical_nn(&offline, &[]),
            Err(NavError::EmptyFingerprints(DatasetPool::Online))
        ));
    }

    #[test]
    fn test_model_distance_uses_floor_for_unheard_access_point() {
        let offline_position = GeoPosition::new(0.0, 0.0, 0.0);
        let offline = repeated(offline_position, 3, 0, &[(AP_A, -48.0)]);
        let offline_map = FingerprintAlgorithm::joint_fingerprints(&offline);

        let mut online = SignalAggregate::new();
        online.put(AP_A, -50.0, None);
        online.put(AP_B, -60.0, None);

        let registry = AccessPointRegistry::from_vec(vec![
            AccessPoint::new(AP_A, "A", GeoPosition::new(10.0, 0.0, 0.0)),
            AccessPoint::new(AP_B, "B", GeoPosition::new(0.0, 5.0, 0.0)),
        ]);
        // 10 单位处预测 -30 - 20 * log10(10) = -50
        let model = PathLossModel::free_space(-30.0, 1.0);

        let synthesized =
            FingerprintAlgorithm::model_fingerprints(&online, &offline_map, &registry, &model).unwrap();
        let fingerprint = synthesized.get(&offline_position).unwrap();
        assert_abs_diff_eq!(fingerprint.average(&AP_A).unwrap(), -50.0, epsilon = 1e-12);
        assert_eq!(fingerprint.average(&AP_B).unwrap(), UNHEARABLE_STRENGTH);

        let distance = FingerprintAlgorithm::fingerprint_distance(&online, fingerprint).unwrap();
        // 填充后: sqrt(0^2 + (-60 + 100)^2) = 40；若忽略缺失接入点则为 0
        assert_abs_diff_eq!(distance, 40.0, epsilon = 1e-9);
    }

    #[test]
    fn test_model_knn_requires_registered_access_points() {
        let (offline, online) = corridor();
        let registry = AccessPointRegistry::new();
        assert!(matches!(
            FingerprintAlgorithm::model_nn(&offline, &online, &registry, &PathLossModel::default()),
            Err(NavError::UnknownAccessPoint(_))
        ));

        let registry = AccessPointRegistry::from_vec(vec![
            AccessPoint::new(AP_A, "A", GeoPosition::new(0.0, 0.0, 0.0)),
            AccessPoint::new(AP_B, "B", GeoPosition::new(10.0, 0.0, 0.0)),
        ]);
        let estimates =
            FingerprintAlgorithm::model_knn(&offline, &online, 2, &registry, &PathLossModel::default()).unwrap();
        assert_eq!(estimates.len(), 2);
        assert_eq!(estimates.method, "model-knn");
    }

    #[test]
    fn test_estimate_file_round_trip() {
        let estimates = EstimateSet::from_vec(
            "knn",
            vec![
                PositionEstimate::new(GeoPosition::new(1.0 / 3.0, 0.1 + 0.2, 0.0), GeoPosition::planar(2.0 / 7.0, -1e-7), 3),
                PositionEstimate::new(GeoPosition::new(12.5, 7.25, 1.0), GeoPosition::planar(1e21, 3.0), 3),
            ],
        );

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("estimates.txt");
        write_estimates(&path, &estimates).unwrap();

        let pairs = read_estimates(&path).unwrap();
        assert_eq!(pairs.len(), 2);
        for ((t, e), original) in pairs.iter().zip(estimates.iter()) {
            assert_eq!(t.coordinates(), original.true_position.coordinates());
            assert_eq!(e.coordinates(), original.estimated.coordinates());
        }
        assert!(!fs::read_to_string(&path).unwrap().ends_with('\n'));
    }

    #[test]
    fn test_full_pipeline_run() {
        let (offline_pool, online_pool) = corridor();
        let dir = tempfile::tempdir().unwrap();
        let offline_path = dir.path().join("offline.trace");
        let online_path = dir.path().join("online.trace");
        write_trace_file(&offline_path, &offline_pool).unwrap();
        write_trace_file(&online_path, &online_pool).unwrap();

        let config = RunConfig {
            offline_trace: offline_path,
            online_trace: online_path,
            offline_precision: 45.0,
            online_precision: 5.0,
            k: 2,
            output_dir: dir.path().to_path_buf(),
            generator: GeneratorConfig {
                offline_size: 4,
                online_size: 2,
                seed: Some(7),
                ..GeneratorConfig::default()
            },
            ..RunConfig::default()
        };
        let pipeline = PositioningPipeline::new(config).unwrap();
        let methods = pipeline.default_methods();
        assert_eq!(methods, vec![Method::EmpiricalNn, Method::EmpiricalKnn]);

        let summary = pipeline.run(&methods).unwrap();
        assert_eq!(summary.offline_entries, 12);
        assert_eq!(summary.online_entries, 4);
        assert_eq!(summary.reports.len(), 2);
        for report in &summary.reports {
            assert!(report.estimates_path.exists());
            let score = fs::read_to_string(&report.score_path).unwrap();
            assert_eq!(score.lines().count(), 2);
            assert!(score.lines().last().unwrap().ends_with("percentage=1.0"));
        }
        print!("{}", summary);
    }
}
