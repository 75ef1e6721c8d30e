/// 轨迹解析测试
///
/// 覆盖字段解析、不同长度的接入点值、ad-hoc 节点、过滤器和错误行

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use wifinav::algorithms::*;
    use wifinav::trace::*;
    use wifinav::NavError;

    const SAMPLE: &str = "\
# timestamp=2006-02-11 08:31:58
t=1139643118358;id=00:02:2D:21:0F:33;pos=0.0,0.0,0.0;degree=0.0;00:14:BF:B1:7C:54=-56,2437000000,3;00:16:B6:B7:5D:8F=-70,2437000000,3
t=1139643118744;id=00:02:2D:21:0F:33;pos=0.0,0.0,0.0;degree=0.0;00:14:BF:B1:7C:54=-52,2437000000,3;00:0F:A3:39:E1:C0=-95,2462000000,1
t=1139643119002;id=00:02:2D:21:0F:33;pos=2.0,-1.5,0.0;degree=92.5;speed=1.25;00:14:BF:B1:7C:54=-60,2437000000,3,-91
";

    fn ap(text: &str) -> AccessPointId {
        AccessPointId::parse(text).unwrap()
    }

    #[test]
    fn test_parse_sample_lines() {
        let entries = TraceParser::new(5.0).parse_str(SAMPLE).unwrap();
        assert_eq!(entries.len(), 3);

        let first = &entries[0];
        assert_eq!(first.timestamp, 1139643118358);
        assert_eq!(first.device, ap("00:02:2D:21:0F:33"));
        assert_eq!(first.position.coordinates(), (0.0, 0.0, 0.0));
        assert_eq!(first.position.orientation(), 0.0);
        assert_eq!(first.samples.len(), 2);
        assert_eq!(first.samples.channel(&ap("00:14:BF:B1:7C:54")), Some(2437000000.0));

        let third = &entries[2];
        assert_eq!(third.speed, Some(1.25));
        // 92.5 / 5 = 18.5 向上取整为 19 * 5 = 95
        assert_eq!(third.position.orientation(), 95.0);
        let lobby = ap("00:14:BF:B1:7C:54");
        assert_eq!(third.samples.average(&lobby).unwrap(), -60.0);
        assert_eq!(third.samples.average_noise(&lobby).unwrap(), -91.0);
        println!("第一条记录时间: {:?}", first.timestamp_utc());
    }

    #[test]
    fn test_ad_hoc_nodes() {
        let skip = TraceParser::new(5.0).parse_str(SAMPLE).unwrap();
        assert!(!skip[1].samples.contains(&ap("00:0F:A3:39:E1:C0")));

        let keep = TraceParser::new(5.0).with_skip_ad_hoc(false).parse_str(SAMPLE).unwrap();
        assert!(keep[1].samples.contains(&ap("00:0F:A3:39:E1:C0")));
    }

    #[test]
    fn test_access_point_filters() {
        let only_lobby = TraceParser::new(5.0)
            .with_ap_filter(ApFilter::explicit([ap("00:14:BF:B1:7C:54")]))
            .parse_str(SAMPLE)
            .unwrap();
        assert!(only_lobby.iter().all(|e| e.samples.len() == 1));

        let vendor = TraceParser::new(5.0)
            .with_ap_filter(ApFilter::pattern("^00:16").unwrap())
            .parse_str(SAMPLE)
            .unwrap();
        assert_eq!(vendor[0].samples.len(), 1);
        assert!(vendor[2].samples.is_empty());
    }

    #[test]
    fn test_position_filter_drops_entries() {
        let parser = TraceParser::new(5.0)
            .with_position_filter(PositionFilter::Exclude(vec![GeoPosition::new(0.0, 0.0, 0.0)]));
        let entries = parser.parse_str(SAMPLE).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].position.x(), 2.0);
    }

    #[test]
    fn test_orientation_filter_keeps_entry_without_orientation() {
        let parser = TraceParser::new(5.0).with_orientation_filter(OrientationFilter::new([0.0]));
        let entries = parser.parse_str(SAMPLE).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].position.orientation(), 0.0);
        assert!(!entries[2].position.has_orientation());
    }

    #[test]
    fn test_malformed_lines_fail_whole_file() {
        let cases = [
            "t=1;pos=0,0,0;00:14:BF:B1:7C:54",
            "t=1;pos=0,0",
            "t=1;00:14:BF:B1:7C:54=-50,1",
            "t=1;pos=0,0,0;not-a-mac=-50,1",
            "t=1;pos=0,0,0;00:14:BF:B1:7C:54=-50",
            "t=1;pos=0,0,0;00:14:BF:B1:7C:54=-50,1,0,-90,7",
            "t=x;pos=0,0,0",
            "t=1;pos=0,0,0;degree=720",
        ];
        for case in cases {
            let text = format!("pos=1,1,1\n{}", case);
            match TraceParser::new(1.0).parse_str(&text) {
                Err(NavError::Parse { line, .. }) => assert_eq!(line, 2, "{}", case),
                other => panic!("'{}' 应解析失败，实际 {:?}", case, other.map(|e| e.len())),
            }
        }
    }

    #[test]
    fn test_written_file_parses_back() {
        let entries = TraceParser::new(5.0).parse_str(SAMPLE).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("copy.trace");
        write_trace_file(&path, &entries).unwrap();

        let again = TraceParser::new(5.0).with_skip_ad_hoc(false).parse_file(&path).unwrap();
        assert_eq!(again.len(), entries.len());
        for (a, b) in again.iter().zip(&entries) {
            assert_eq!(a.position, b.position);
            assert_eq!(a.timestamp, b.timestamp);
            let a_aps: HashSet<_> = a.samples.access_points().collect();
            let b_aps: HashSet<_> = b.samples.access_points().collect();
            assert_eq!(a_aps, b_aps);
        }
    }

    #[test]
    fn test_missing_file() {
        let result = TraceParser::new(5.0).parse_file("/definitely/not/here.trace");
        assert!(matches!(result, Err(NavError::Io { .. })));
    }
}
