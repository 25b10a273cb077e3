//! The `benchkeep query` command: print metric points as TSV.
//!
//! Columns: `commit`, `date`, `label`, `value`, `unit`. Rows follow append
//! order, so each series reads oldest first.

use anyhow::{Context, Result};
use benchkeep_core::MetricPoint;

use crate::config::Config;
use crate::history::{file_backend, open_history};

pub async fn run_query(
    config: &Config,
    group: &str,
    bench: Option<&str>,
    label: Option<&str>,
) -> Result<()> {
    let backend = file_backend(config);
    let history = open_history(&backend, config.repository.url.trim())
        .await
        .with_context(|| format!("Failed to open history at {}", config.store.path.display()))?;

    if !history.store.groups().iter().any(|g| g == group) {
        eprintln!("No tool group named '{}'.", group);
        return Ok(());
    }

    println!("commit\tdate\tlabel\tvalue\tunit");
    let mut count = 0usize;
    for point in history.store.query(group, bench, label) {
        println!("{}", format_row(&point));
        count += 1;
    }
    if count == 0 {
        eprintln!("No points matched.");
    }
    Ok(())
}

fn format_row(point: &MetricPoint) -> String {
    format!(
        "{}\t{}\t{}\t{}\t{}",
        point.commit.id,
        point.date,
        point.label,
        point.value,
        point.unit.replace(['\t', '\n'], " ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use benchkeep_core::{CommitDescriptor, Person};
    use chrono::DateTime;

    #[test]
    fn test_row_flattens_unit_whitespace() {
        let point = MetricPoint {
            label: "BenchmarkRouteRequest".to_string(),
            commit: CommitDescriptor {
                author: Person::new("Dev", "dev@example.com"),
                committer: Person::new("Dev", "dev@example.com"),
                distinct: true,
                id: "abc".to_string(),
                message: "m".to_string(),
                timestamp: DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap(),
                tree_id: None,
                url: "u".to_string(),
            },
            date: 7,
            value: 3147699311u64.into(),
            unit: "ns/op\t  214536 B/op".to_string(),
            extra: String::new(),
        };
        assert_eq!(
            format_row(&point),
            "abc\t7\tBenchmarkRouteRequest\t3147699311\tns/op   214536 B/op"
        );
    }
}
