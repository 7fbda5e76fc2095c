//! Process lookup and termination by name or pid.

use tokio::process::Command;

/// Find the pid of a running process whose name matches `name` exactly
pub async fn find_running(name: &str) -> Option<u32> {
    let output = if cfg!(windows) {
        let image = if name.ends_with(".exe") {
            name.to_string()
        } else {
            format!("{}.exe", name)
        };
        Command::new("tasklist")
            .args(["/FI", &format!("IMAGENAME eq {}", image), "/FO", "CSV", "/NH"])
            .output()
            .await
    } else {
        Command::new("pgrep").args(["-x", name]).output().await
    };

    let output = match output {
        Ok(output) => output,
        Err(e) => {
            tracing::warn!("Process lookup for '{}' failed: {}", name, e);
            return None;
        }
    };

    // pgrep exits with 1 when nothing matches
    if !output.status.success() {
        return None;
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    if cfg!(windows) {
        parse_tasklist_pid(&stdout)
    } else {
        parse_pgrep_pid(&stdout)
    }
}

/// Forcefully terminate a process that this runtime did not spawn
pub async fn kill_pid(pid: u32) -> std::io::Result<()> {
    let status = if cfg!(windows) {
        Command::new("taskkill")
            .args(["/PID", &pid.to_string(), "/F"])
            .status()
            .await?
    } else {
        Command::new("kill")
            .args(["-9", &pid.to_string()])
            .status()
            .await?
    };

    if status.success() {
        Ok(())
    } else {
        Err(std::io::Error::other(format!(
            "kill of pid {} exited with {}",
            pid, status
        )))
    }
}

fn parse_pgrep_pid(stdout: &str) -> Option<u32> {
    stdout
        .lines()
        .find_map(|line| line.trim().parse::<u32>().ok())
}

/// `"llama-server.exe","1234","Console","1","12,345 K"`
fn parse_tasklist_pid(stdout: &str) -> Option<u32> {
    stdout.lines().find_map(|line| {
        let mut fields = line.split("\",\"");
        let _image = fields.next()?;
        fields.next()?.trim_matches('"').parse::<u32>().ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pgrep_pid() {
        assert_eq!(parse_pgrep_pid("4242\n4343\n"), Some(4242));
        assert_eq!(parse_pgrep_pid(""), None);
    }

    #[test]
    fn test_parse_tasklist_pid() {
        let line = "\"llama-server.exe\",\"1234\",\"Console\",\"1\",\"12,345 K\"\r\n";
        assert_eq!(parse_tasklist_pid(line), Some(1234));
        assert_eq!(
            parse_tasklist_pid("INFO: No tasks are running which match the specified criteria."),
            None
        );
    }

    #[tokio::test]
    async fn test_find_running_unknown_name() {
        assert_eq!(find_running("no-such-process-name-xyz").await, None);
    }
}
