/// 算法模块综合演示测试
///
/// 展示如何使用 algorithms 模块中的值类型、信号聚合和路径损耗模型

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use std::collections::HashSet;
    use wifinav::algorithms::*;
    use wifinav::algorithms::statistics;
    use wifinav::NavError;

    fn ap(text: &str) -> AccessPointId {
        AccessPointId::parse(text).unwrap()
    }

    #[test]
    fn test_algorithm_module_access_point_ids() {
        let a = ap("00:14:bf:b1:7c:54");
        let b = ap("00:14:BF:B1:7C:54");
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "00:14:BF:B1:7C:54");

        // 哈希只看后 4 个字节，不同厂商前缀在集合中仍是不同元素
        let mut set = HashSet::new();
        set.insert(ap("00:01:AA:BB:CC:DD"));
        set.insert(ap("FF:FE:AA:BB:CC:DD"));
        set.insert(ap("00:01:AA:BB:CC:DD"));
        assert_eq!(set.len(), 2);

        assert!(matches!(AccessPointId::parse("00:14:BF"), Err(NavError::InvalidMac(_))));
    }

    #[test]
    fn test_algorithm_module_geo_positions() {
        let p = GeoPosition::with_orientation(1.0, 2.0, 0.0, 45.0).unwrap();
        let q = GeoPosition::with_orientation(1.0, 2.0, 0.0, 90.0).unwrap();
        assert_ne!(p, q);
        assert!(p.equals_without_orientation(&q));
        assert_eq!(p.key(false), q.key(false));

        assert!(matches!(
            GeoPosition::with_orientation(0.0, 0.0, 0.0, 360.0),
            Err(NavError::InvalidOrientation(_))
        ));

        let moved = p.add(&GeoPosition::new(2.0, 2.0, 0.0)).stretch(0.5);
        assert_eq!(moved.coordinates(), (1.5, 2.0, 0.0));
        assert_eq!(moved.orientation(), 45.0);
        println!("位置: {}", moved);
    }

    #[test]
    fn test_algorithm_module_signal_aggregate() {
        let mut aggregate = SignalAggregate::new();
        aggregate.put(ap("AA:AA:AA:AA:AA:AA"), -50.0, Some(1.0));
        aggregate.put(ap("AA:AA:AA:AA:AA:AA"), -52.0, Some(11.0));
        aggregate.put(ap("AA:AA:AA:AA:AA:AA"), -54.0, None);
        aggregate.put(ap("BB:BB:BB:BB:BB:BB"), -40.0, Some(6.0));

        let a = ap("AA:AA:AA:AA:AA:AA");
        assert_eq!(aggregate.len(), 2);
        assert_eq!(aggregate.sample_count(&a), 3);
        assert_eq!(aggregate.channel(&a), Some(1.0));
        assert_abs_diff_eq!(aggregate.average(&a).unwrap(), -52.0, epsilon = 1e-12);
        assert_abs_diff_eq!(aggregate.variance(&a).unwrap(), 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(aggregate.std_dev(&a).unwrap(), 2.0, epsilon = 1e-12);

        let order = aggregate.sorted_access_points().unwrap();
        assert_eq!(order, vec![ap("BB:BB:BB:BB:BB:BB"), a]);

        assert!(matches!(
            aggregate.average(&ap("CC:CC:CC:CC:CC:CC")),
            Err(NavError::UnknownAccessPoint(_))
        ));
    }

    #[test]
    fn test_algorithm_module_statistics_properties() {
        let sequences: Vec<Vec<f64>> = vec![
            vec![-50.0],
            vec![-50.0, -52.0],
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            vec![-71.0, -68.5, -90.25, -44.0],
        ];
        for data in &sequences {
            let sd = statistics::std_dev(data).unwrap();
            let var = statistics::variance(data).unwrap();
            assert_abs_diff_eq!(sd * sd, var, epsilon = 1e-9);
        }

        assert_eq!(statistics::median(&[1.0, 2.0, 3.0, 4.0]).unwrap(), 2.5);
        assert_eq!(statistics::median(&[5.0, 1.0, 3.0]).unwrap(), 3.0);
    }

    #[test]
    fn test_algorithm_module_path_loss_variations() {
        // 1. 默认模型
        let model1 = PathLossModel::default();
        assert!(model1.validate().is_ok());

        // 2. 自由空间模型
        let model2 = PathLossModel::free_space(-40.0, 1.0);
        assert_abs_diff_eq!(model2.predict(10.0), -60.0, epsilon = 1e-12);

        // 3. 自定义指数，距离越远信号越弱
        let model3 = PathLossModel::new(-30.0, 3.5, 1.0);
        assert!(model3.predict(2.0) > model3.predict(4.0));

        println!("{}", model1);
        println!("{}", model3);
    }

    #[test]
    fn test_algorithm_module_access_point_registry() {
        let mut registry = AccessPointRegistry::new();
        registry.add(AccessPoint::new(
            ap("00:14:BF:B1:7C:54"),
            "AP_lobby",
            GeoPosition::new(10.0, 5.0, 0.0),
        ));
        registry.add(AccessPoint::new(
            ap("00:16:B6:B7:5D:8F"),
            "AP_hall",
            GeoPosition::new(-3.0, 8.0, 0.0),
        ));

        assert_eq!(registry.len(), 2);
        let position = registry.position_of(&ap("00:14:BF:B1:7C:54")).unwrap();
        assert_eq!(position.coordinates(), (10.0, 5.0, 0.0));
        assert!(registry.position_of(&ap("00:00:00:00:00:01")).is_none());

        registry.remove(&ap("00:16:B6:B7:5D:8F"));
        assert_eq!(registry.len(), 1);
    }
}
