use std::{io, time::Duration};

use crate::{
    outcome::TestStatus,
    report::{OutcomeCounts, Phase, TestReport},
    reporter::{
        TestReporter,
        color::{ColorSetting, SupportsColor, colors::*},
    },
    test::SuitePath,
    warning::TestWarning,
};

/// A line based reporter in the style of the built in test harness.
#[derive(Debug)]
pub struct PrettyReporter<W: io::Write> {
    target: W,
    color_setting: ColorSetting,
}

impl Default for PrettyReporter<io::Stdout> {
    fn default() -> Self {
        Self {
            target: io::stdout(),
            color_setting: Default::default(),
        }
    }
}

impl<W: io::Write> PrettyReporter<W> {
    pub fn with_target<WithTarget: io::Write>(
        self,
        with_target: WithTarget,
    ) -> PrettyReporter<WithTarget> {
        PrettyReporter {
            target: with_target,
            color_setting: self.color_setting,
        }
    }

    pub fn with_color_setting(self, color_setting: impl Into<ColorSetting>) -> Self {
        PrettyReporter {
            color_setting: color_setting.into(),
            ..self
        }
    }

    pub fn into_target(self) -> W {
        self.target
    }
}

impl<W: io::Write + SupportsColor> PrettyReporter<W> {
    /// Return whether this reporter will currently emit colored output.
    pub fn use_color(&self) -> bool {
        match self.color_setting {
            ColorSetting::Automatic => self.target.supports_color(),
            ColorSetting::Always => true,
            ColorSetting::Never => false,
        }
    }

    fn write_colored(&mut self, color: &str, text: &str) -> io::Result<()> {
        match self.use_color() {
            true => write!(self.target, "{color}{text}{RESET}"),
            false => write!(self.target, "{text}"),
        }
    }
}

fn qualified(name: &str, suite: &SuitePath) -> String {
    match suite.is_root() {
        true => name.to_string(),
        false => format!("{suite}::{name}"),
    }
}

impl<W: io::Write + Send + SupportsColor> TestReporter for PrettyReporter<W> {
    type Error = io::Error;

    fn report_run_start(&mut self, tests: usize, filtered_out: usize) -> Result<(), Self::Error> {
        let _ = filtered_out;
        match tests {
            1 => writeln!(self.target, "\nrunning 1 test"),
            count => writeln!(self.target, "\nrunning {count} tests"),
        }
    }

    fn report_phase(&mut self, report: &TestReport) -> Result<(), Self::Error> {
        let name = qualified(&report.name, &report.suite);
        match (report.phase, &report.status) {
            (Phase::Call, TestStatus::Passed) => {
                write!(self.target, "test {name} ... ")?;
                self.write_colored(GREEN, "ok")?;
            }
            (Phase::Call, TestStatus::Failed(_)) => {
                write!(self.target, "test {name} ... ")?;
                self.write_colored(RED, "FAILED")?;
            }
            (Phase::Setup | Phase::Call, TestStatus::Skipped { reason }) => {
                write!(self.target, "test {name} ... ")?;
                self.write_colored(YELLOW, "skipped")?;
                if let Some(reason) = reason {
                    write!(self.target, ", {reason}")?;
                }
            }
            (Phase::Setup | Phase::Teardown, TestStatus::Failed(_)) => {
                write!(self.target, "test {name} ... ")?;
                self.write_colored(RED, &format!("ERROR at {}", report.phase))?;
            }
            _ => return Ok(()),
        }
        writeln!(self.target)
    }

    fn report_warning(&mut self, warning: &TestWarning) -> Result<(), Self::Error> {
        self.write_colored(CYAN, "warning")?;
        writeln!(self.target, ": {warning}")
    }

    fn report_run_outcomes(
        &mut self,
        reports: &[TestReport],
        counts: &OutcomeCounts,
        duration: Duration,
    ) -> Result<(), Self::Error> {
        let failures: Vec<_> = reports
            .iter()
            .filter_map(|report| Some((report, report.status.failure()?)))
            .collect();

        if !failures.is_empty() {
            writeln!(self.target)?;
            writeln!(self.target, "failures:")?;
            writeln!(self.target)?;
            for (report, failure) in failures.iter() {
                let name = qualified(&report.name, &report.suite);
                writeln!(self.target, "---- {name} {} ----", report.phase)?;
                writeln!(self.target, "{failure}")?;
            }
            writeln!(self.target)?;
            writeln!(self.target, "failures:")?;
            for (report, _) in failures.iter() {
                let name = qualified(&report.name, &report.suite);
                writeln!(self.target, "    {name} ({})", report.phase)?;
            }
        }

        writeln!(self.target)?;
        write!(self.target, "test result: ")?;
        match counts.is_ok() {
            true => self.write_colored(GREEN, "ok")?,
            false => self.write_colored(RED, "FAILED")?,
        }
        writeln!(
            self.target,
            ". {counts}; finished in {:.2}s",
            duration.as_secs_f64()
        )?;
        writeln!(self.target)
    }
}
