//! Run report formatting.

use crate::orchestrator::RunReport;
use crate::OutputFormat;
use anyhow::Result;
use lib_types::PortInfo;
use std::io::Write;

/// Write a run report to `out`.
pub fn write_report(out: &mut impl Write, report: &RunReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            writeln!(out, "\n=== Estimation Run ===\n")?;
            write_port_text(out, &report.port)?;
            writeln!(out)?;
            writeln!(out, "Rows processed: {}", report.rows)?;
            writeln!(out, "Elapsed:        {:.3} s", report.elapsed.as_secs_f64())?;
            writeln!(out, "Result file:    {}", report.output_path.display())?;
        }
        OutputFormat::Json => {
            writeln!(out, "{}", serde_json::to_string_pretty(report)?)?;
        }
    }
    Ok(())
}

/// Write the port information reported by a module.
pub fn write_port(out: &mut impl Write, port: &PortInfo, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => write_port_text(out, port)?,
        OutputFormat::Json => {
            writeln!(out, "{}", serde_json::to_string_pretty(port)?)?;
        }
    }
    Ok(())
}

fn write_port_text(out: &mut impl Write, port: &PortInfo) -> std::io::Result<()> {
    writeln!(out, "Estimator Port: {}", port.display_name())?;
    if let Some(intro) = &port.introduction {
        writeln!(out, "  {}", intro)?;
    }
    writeln!(out, "  Nx:           {}", port.nx)?;
    writeln!(out, "  Nz:           {}", port.nz)?;
    writeln!(out, "  PredictStep:  {}", port.predict_step)?;
    writeln!(out, "  Interval:     {}", port.interval)?;
    writeln!(out, "  PredictTime:  {}", port.predict_time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    fn port() -> PortInfo {
        PortInfo {
            name: Some("Kalman Filter v1.0".to_string()),
            introduction: None,
            nx: 4,
            nz: 2,
            predict_step: 2,
            interval: 0.005,
            predict_time: 0.01,
        }
    }

    fn report() -> RunReport {
        RunReport {
            port: port(),
            rows: 1000,
            output_path: PathBuf::from("EstimationResult/EstimationResult_20251105140309.txt"),
            elapsed: Duration::from_millis(42),
        }
    }

    #[test]
    fn test_text_report() {
        let mut buf = Vec::new();
        write_report(&mut buf, &report(), OutputFormat::Text).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.contains("Estimator Port: Kalman Filter v1.0"));
        assert!(text.contains("Rows processed: 1000"));
        assert!(text.contains("EstimationResult_20251105140309.txt"));
    }

    #[test]
    fn test_json_report() {
        let mut buf = Vec::new();
        write_report(&mut buf, &report(), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();

        assert_eq!(value["rows"], 1000);
        assert_eq!(value["port"]["nx"], 4);
        assert_eq!(value["port"]["introduction"], serde_json::Value::Null);
        assert_eq!(value["elapsed_s"], 0.042);
        assert_eq!(
            value["output_path"],
            "EstimationResult/EstimationResult_20251105140309.txt"
        );
    }

    #[test]
    fn test_json_port_matches_serialized_info() {
        let mut buf = Vec::new();
        write_port(&mut buf, &port(), OutputFormat::Json).unwrap();
        let parsed: PortInfo = serde_json::from_slice(&buf).unwrap();
        assert_eq!(parsed, port());
    }

    #[test]
    fn test_port_text_without_name() {
        let mut info = port();
        info.name = None;
        let mut buf = Vec::new();
        write_port(&mut buf, &info, OutputFormat::Text).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("Estimator Port: "));
        assert!(text.contains("Nz:           2"));
    }
}
