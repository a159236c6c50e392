#[cfg(test)]
mod cron_utils_tests {
    use std::time::Duration as StdDuration;

    use chrono::{Datelike, TimeZone, Timelike, Utc, Weekday};
    use dcron_core::SchedulerError;
    use dcron_dispatcher::cron_utils::*;

    #[test]
    fn test_cron_scheduler_creation() {
        assert!(CronScheduler::new("*/5 * * * *").is_ok());
        assert!(CronScheduler::new("invalid").is_err());
        // 只接受5字段表达式
        assert!(CronScheduler::new("0 0 0 * * *").is_err());
        assert!(CronScheduler::new("").is_err());
    }

    #[test]
    fn test_invalid_expression_error() {
        match CronScheduler::new("61 * * * *") {
            Err(SchedulerError::InvalidCron { expr, .. }) => assert_eq!(expr, "61 * * * *"),
            other => panic!("expected InvalidCron, got {other:?}"),
        }
    }

    #[test]
    fn test_next_execution_time() {
        let scheduler = CronScheduler::new("30 2 * * *").unwrap();

        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let next = scheduler.next_execution_time(now).unwrap();

        assert_eq!(next, Utc.with_ymd_and_hms(2024, 1, 2, 2, 30, 0).unwrap());
    }

    #[test]
    fn test_next_execution_time_is_strictly_after() {
        let scheduler = CronScheduler::new("0 * * * *").unwrap();
        let on_the_hour = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();

        let next = scheduler.next_execution_time(on_the_hour).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 1, 1, 13, 0, 0).unwrap());
    }

    #[test]
    fn test_macros() {
        let now = Utc.with_ymd_and_hms(2024, 3, 13, 12, 30, 0).unwrap();

        let daily = CronScheduler::new("@daily").unwrap();
        assert_eq!(
            daily.next_execution_time(now).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 14, 0, 0, 0).unwrap()
        );

        let midnight = CronScheduler::new("@midnight").unwrap();
        assert_eq!(
            midnight.next_execution_time(now),
            daily.next_execution_time(now)
        );

        let hourly = CronScheduler::new("@hourly").unwrap();
        assert_eq!(
            hourly.next_execution_time(now).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 13, 13, 0, 0).unwrap()
        );

        let monthly = CronScheduler::new("@monthly").unwrap();
        assert_eq!(
            monthly.next_execution_time(now).unwrap(),
            Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap()
        );

        let yearly = CronScheduler::new("@yearly").unwrap();
        assert_eq!(
            yearly.next_execution_time(now).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
        );
        assert!(CronScheduler::new("@annually").is_ok());

        // 2024-03-13 是周三
        let weekly = CronScheduler::new("@weekly").unwrap();
        let next = weekly.next_execution_time(now).unwrap();
        assert_eq!(next.weekday(), Weekday::Sun);
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 17, 0, 0, 0).unwrap());

        assert!(CronScheduler::new("@fortnightly").is_err());
    }

    #[test]
    fn test_day_of_week_numbering() {
        // 2024-03-13 是周三
        let now = Utc.with_ymd_and_hms(2024, 3, 13, 12, 0, 0).unwrap();

        let sunday = CronScheduler::new("0 9 * * 0").unwrap();
        assert_eq!(
            sunday.next_execution_time(now).unwrap().weekday(),
            Weekday::Sun
        );

        let sunday_seven = CronScheduler::new("0 9 * * 7").unwrap();
        assert_eq!(
            sunday_seven.next_execution_time(now),
            sunday.next_execution_time(now)
        );

        let friday = CronScheduler::new("0 9 * * 5").unwrap();
        assert_eq!(
            friday.next_execution_time(now).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 15, 9, 0, 0).unwrap()
        );

        let weekdays = CronScheduler::new("0 9 * * 1-5").unwrap();
        let upcoming = weekdays.upcoming_times(now, 5);
        let days: Vec<Weekday> = upcoming.iter().map(|t| t.weekday()).collect();
        assert_eq!(
            days,
            vec![
                Weekday::Thu,
                Weekday::Fri,
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed
            ]
        );

        let weekend = CronScheduler::new("0 9 * * 6-7").unwrap();
        let days: Vec<Weekday> = weekend
            .upcoming_times(now, 2)
            .iter()
            .map(|t| t.weekday())
            .collect();
        assert_eq!(days, vec![Weekday::Sat, Weekday::Sun]);

        let named = CronScheduler::new("0 9 * * Mon-Fri").unwrap();
        assert_eq!(named.upcoming_times(now, 5), upcoming);

        assert!(CronScheduler::new("0 9 * * 8").is_err());
        assert!(CronScheduler::new("0 9 * * 5-1").is_err());
    }

    #[test]
    fn test_day_of_month_or_day_of_week() {
        // 2026-01-01 是周四；日和周都受限时满足任一即触发
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let scheduler = CronScheduler::new("0 0 1 * 1").unwrap();

        let expected: Vec<_> = [(1, 5), (1, 12), (1, 19), (1, 26), (2, 1), (2, 2)]
            .iter()
            .map(|&(month, day)| Utc.with_ymd_and_hms(2026, month, day, 0, 0, 0).unwrap())
            .collect();
        assert_eq!(scheduler.upcoming_times(now, 6), expected);

        // 同时满足两个字段的时刻只触发一次（2026-06-01 是周一）
        let june = Utc.with_ymd_and_hms(2026, 5, 31, 12, 0, 0).unwrap();
        assert_eq!(
            scheduler.upcoming_times(june, 2),
            vec![
                Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2026, 6, 8, 0, 0, 0).unwrap(),
            ]
        );

        // 只有一个字段受限时按该字段匹配
        let first_of_month = CronScheduler::new("0 0 1 * *").unwrap();
        assert_eq!(
            first_of_month.next_execution_time(now).unwrap(),
            Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap()
        );
        let mondays = CronScheduler::new("0 0 * * 1").unwrap();
        assert_eq!(
            mondays.next_execution_time(now).unwrap(),
            Utc.with_ymd_and_hms(2026, 1, 5, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_every_interval() {
        let scheduler = CronScheduler::new("@every 1h30m").unwrap();
        assert_eq!(scheduler.interval(), Some(StdDuration::from_secs(5400)));

        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
            + chrono::Duration::milliseconds(250);
        let next = scheduler.next_execution_time(now).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 1, 1, 13, 30, 0).unwrap());
        assert_eq!(next.nanosecond(), 0);

        let sub_second = CronScheduler::new("@every 10ms").unwrap();
        assert_eq!(sub_second.interval(), Some(StdDuration::from_secs(1)));

        let fractional = CronScheduler::new("@every 1.5s").unwrap();
        assert_eq!(fractional.interval(), Some(StdDuration::from_secs(1)));

        assert!(CronScheduler::new("@every").is_err());
        assert!(CronScheduler::new("@every 5").is_err());
        assert!(CronScheduler::new("@every 5d").is_err());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("0"), Ok(StdDuration::ZERO));
        assert_eq!(parse_duration("300ms"), Ok(StdDuration::from_millis(300)));
        assert_eq!(parse_duration("1.5h"), Ok(StdDuration::from_secs(5400)));
        assert_eq!(parse_duration("2m10s"), Ok(StdDuration::from_secs(130)));
        assert_eq!(parse_duration("1µs"), Ok(StdDuration::from_micros(1)));
        assert_eq!(parse_duration("7ns"), Ok(StdDuration::from_nanos(7)));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("h").is_err());
        assert!(parse_duration("1.2.3s").is_err());
    }

    #[test]
    fn test_upcoming_times() {
        let scheduler = CronScheduler::new("0 * * * *").unwrap();

        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 30, 0).unwrap();
        let upcoming = scheduler.upcoming_times(now, 3);

        assert_eq!(upcoming.len(), 3);
        assert_eq!(upcoming[0].hour(), 13);
        assert_eq!(upcoming[1].hour(), 14);
        assert_eq!(upcoming[2].hour(), 15);
    }

    #[test]
    fn test_time_until_next_execution() {
        let scheduler = CronScheduler::new("*/15 * * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 5, 0).unwrap();

        let until = scheduler.time_until_next_execution(now).unwrap();
        assert_eq!(until.num_minutes(), 10);
    }

    #[test]
    fn test_validate_cron_expression() {
        assert!(CronScheduler::validate_cron_expression("0 0 * * *").is_ok());
        assert!(CronScheduler::validate_cron_expression("*/5 9-17 * * 1-5").is_ok());
        assert!(CronScheduler::validate_cron_expression("0 0 32 * *").is_err());
        assert!(CronScheduler::validate_cron_expression("@every 30s").is_ok());
    }
}
