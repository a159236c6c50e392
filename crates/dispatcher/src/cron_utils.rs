use std::str::FromStr;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Timelike, Utc};
use cron::Schedule;
use tracing::debug;

use dcron_core::{SchedulerError, SchedulerResult};

const DAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

const NANOS_PER_SECOND: u128 = 1_000_000_000;

#[derive(Debug, Clone)]
enum ScheduleKind {
    /// 日和周两个字段都有限制时拆成两个调度，满足任一即触发
    Cron(Vec<Schedule>),
    Every(StdDuration),
}

/// CRON表达式解析和调度工具
///
/// 支持三种写法：
///
/// - 标准5字段表达式 `分 时 日 月 周`，周字段 0 和 7 均表示周日；
///   日和周字段都不是 `*` 时，满足其中任一字段即触发
/// - 预定义宏 `@yearly` `@annually` `@monthly` `@weekly` `@daily` `@midnight` `@hourly`
/// - 固定间隔 `@every <duration>`，如 `@every 1h30m`，不足1秒按1秒计算
///
/// 所有时间按 UTC 计算。
#[derive(Debug, Clone)]
pub struct CronScheduler {
    expr: String,
    kind: ScheduleKind,
}

impl CronScheduler {
    /// 创建新的CRON调度器
    pub fn new(cron_expr: &str) -> SchedulerResult<Self> {
        let invalid = |message: String| SchedulerError::InvalidCron {
            expr: cron_expr.to_string(),
            message,
        };

        let trimmed = cron_expr.trim();
        let kind = if let Some(interval) = trimmed.strip_prefix("@every") {
            let every = parse_duration(interval.trim()).map_err(invalid)?;
            ScheduleKind::Every(every_interval(every))
        } else {
            let expressions = match macro_expression(trimmed) {
                Some(expanded) => vec![expanded.to_string()],
                None => to_six_fields(trimmed).map_err(invalid)?,
            };
            let schedules = expressions
                .iter()
                .map(|six_field| {
                    debug!("CRON表达式 {} 转换为 {}", trimmed, six_field);
                    Schedule::from_str(six_field).map_err(|e| invalid(e.to_string()))
                })
                .collect::<SchedulerResult<Vec<_>>>()?;
            ScheduleKind::Cron(schedules)
        };

        Ok(Self {
            expr: trimmed.to_string(),
            kind,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expr
    }

    /// `@every` 调度的间隔
    pub fn interval(&self) -> Option<StdDuration> {
        match &self.kind {
            ScheduleKind::Every(every) => Some(*every),
            ScheduleKind::Cron(_) => None,
        }
    }

    /// 获取下一次执行时间，严格晚于 `from`
    pub fn next_execution_time(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match &self.kind {
            ScheduleKind::Cron(schedules) => schedules
                .iter()
                .filter_map(|schedule| schedule.after(&from).next())
                .min(),
            ScheduleKind::Every(every) => {
                let every = Duration::from_std(*every).ok()?;
                from.with_nanosecond(0)?.checked_add_signed(every)
            }
        }
    }

    /// 获取从指定时间开始的多个执行时间
    pub fn upcoming_times(&self, from: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
        let mut times = Vec::with_capacity(count);
        let mut cursor = from;
        while times.len() < count {
            match self.next_execution_time(cursor) {
                Some(next) => {
                    times.push(next);
                    cursor = next;
                }
                None => break,
            }
        }
        times
    }

    /// 验证CRON表达式是否有效
    pub fn validate_cron_expression(cron_expr: &str) -> SchedulerResult<()> {
        Self::new(cron_expr).map(|_| ())
    }

    /// 计算下次执行时间距离现在的时长
    pub fn time_until_next_execution(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.next_execution_time(now).map(|next| next - now)
    }
}

fn macro_expression(expr: &str) -> Option<&'static str> {
    let expanded = match expr {
        "@yearly" | "@annually" => "0 0 0 1 1 *",
        "@monthly" => "0 0 0 1 * *",
        "@weekly" => "0 0 0 * * Sun",
        "@daily" | "@midnight" => "0 0 0 * * *",
        "@hourly" => "0 0 * * * *",
        _ => return None,
    };
    Some(expanded)
}

/// 5字段表达式补齐秒字段，并把数字形式的星期转换为星期名称
///
/// 日和周字段同时受限时返回两个表达式：一个只限制日，一个只限制周。
fn to_six_fields(expr: &str) -> Result<Vec<String>, String> {
    if expr.starts_with('@') {
        return Err(format!("不支持的预定义表达式: {expr}"));
    }

    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(format!("需要5个字段，实际为{}个", fields.len()));
    }

    let day_of_week = fields[4]
        .split(',')
        .map(translate_day_of_week)
        .collect::<Result<Vec<_>, _>>()?
        .join(",");

    let (minute, hour, day_of_month, month) = (fields[0], fields[1], fields[2], fields[3]);
    let expression = |dom: &str, dow: &str| format!("0 {minute} {hour} {dom} {month} {dow}");

    if is_unrestricted(day_of_month) || is_unrestricted(fields[4]) {
        Ok(vec![expression(day_of_month, &day_of_week)])
    } else {
        Ok(vec![
            expression(day_of_month, "*"),
            expression("*", &day_of_week),
        ])
    }
}

fn is_unrestricted(field: &str) -> bool {
    field == "*" || field == "?"
}

// cron crate 的星期从周日=1开始编号，数字形式统一展开为名称列表
fn translate_day_of_week(item: &str) -> Result<String, String> {
    if item.starts_with('*') || item.starts_with('?') {
        return Ok(item.to_string());
    }

    let (range, step) = match item.split_once('/') {
        Some((range, step)) => {
            let step: usize = step
                .parse()
                .map_err(|_| format!("无效的星期步长: {item}"))?;
            if step == 0 {
                return Err(format!("无效的星期步长: {item}"));
            }
            (range, Some(step))
        }
        None => (item, None),
    };

    let (start, end) = match range.split_once('-') {
        Some((start, end)) => (start, Some(end)),
        None => (range, None),
    };

    let parse_day = |value: &str| -> Option<usize> { value.parse().ok() };
    let (Some(start), end) = (parse_day(start), end.map(parse_day)) else {
        // 名称形式交给 cron crate 解析
        return Ok(item.to_string());
    };
    let end = match (end, step) {
        (Some(Some(end)), _) => end,
        (Some(None), _) => return Ok(item.to_string()),
        (None, Some(_)) => 6,
        (None, None) => start,
    };

    if start > 7 || end > 7 || start > end {
        return Err(format!("无效的星期取值: {item}"));
    }

    let mut names: Vec<&str> = Vec::new();
    for day in (start..=end).step_by(step.unwrap_or(1)) {
        let name = DAY_NAMES[day % 7];
        if !names.contains(&name) {
            names.push(name);
        }
    }
    Ok(names.join(","))
}

/// 间隔向下取整到秒，最小1秒
fn every_interval(every: StdDuration) -> StdDuration {
    if every < StdDuration::from_secs(1) {
        StdDuration::from_secs(1)
    } else {
        StdDuration::from_secs(every.as_secs())
    }
}

/// 解析 `1h30m`、`1.5h`、`300ms` 形式的时长
pub fn parse_duration(input: &str) -> Result<StdDuration, String> {
    if input.is_empty() {
        return Err("缺少时长".to_string());
    }
    if input == "0" {
        return Ok(StdDuration::ZERO);
    }

    let mut total: u128 = 0;
    let mut rest = input;
    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_end);
        let unit_end = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_end);
        rest = tail;

        let unit_nanos: u128 = match unit {
            "ns" => 1,
            "us" | "µs" | "μs" => 1_000,
            "ms" => 1_000_000,
            "s" => NANOS_PER_SECOND,
            "m" => 60 * NANOS_PER_SECOND,
            "h" => 3600 * NANOS_PER_SECOND,
            "" => return Err(format!("时长缺少单位: {input}")),
            other => return Err(format!("未知的时长单位 {other}: {input}")),
        };

        let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
        if whole.is_empty() && fraction.is_empty() {
            return Err(format!("无效的时长: {input}"));
        }
        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| format!("无效的时长: {input}"))?
        };

        let mut value = whole
            .checked_mul(unit_nanos)
            .ok_or_else(|| format!("时长溢出: {input}"))?;
        let mut scale = unit_nanos;
        for digit in fraction.chars() {
            let digit = digit
                .to_digit(10)
                .ok_or_else(|| format!("无效的时长: {input}"))?;
            scale /= 10;
            value += u128::from(digit) * scale;
        }

        total = total
            .checked_add(value)
            .ok_or_else(|| format!("时长溢出: {input}"))?;
    }

    let nanos = u64::try_from(total).map_err(|_| format!("时长溢出: {input}"))?;
    Ok(StdDuration::from_nanos(nanos))
}
