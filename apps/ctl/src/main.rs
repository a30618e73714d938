use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use reqwest::blocking::Client;
use reqwest::Method;

use heater_core::parse_setpoint;

#[derive(Parser, Debug)]
#[command(name = "heater-ctl", about = "Talk to a running heater-server")]
struct Args {
    #[arg(long, default_value = "http://localhost:5000")]
    url: String,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
enum Action {
    /// Show the current state
    Status,
    Enable,
    Disable,
    /// Hold a manual target temperature until the override expires
    Set {
        #[arg(allow_hyphen_values = true)]
        value: String,
    },
    /// Drop the manual target and follow the day/night schedule again
    Resume,
}

fn route(action: &Action) -> Result<(Method, String)> {
    Ok(match action {
        Action::Status => (Method::GET, "/status".to_string()),
        Action::Enable => (Method::POST, "/enable".to_string()),
        Action::Disable => (Method::POST, "/disable".to_string()),
        Action::Set { value } => {
            let temp = parse_setpoint(value)?;
            (Method::POST, format!("/set_desired_temp/{}", temp))
        }
        Action::Resume => (Method::DELETE, "/override".to_string()),
    })
}

fn run(base: &str, action: &Action) -> Result<String> {
    let (method, path) = route(action)?;
    let url = format!("{}{}", base.trim_end_matches('/'), path);
    let response = Client::new()
        .request(method, &url)
        .send()
        .with_context(|| format!("Failed to reach {}", url))?;

    let status = response.status();
    let body = response.text()?;
    if !status.is_success() {
        bail!("{}: {}", status, body);
    }
    let json: serde_json::Value = serde_json::from_str(&body).context("Unexpected response")?;
    Ok(serde_json::to_string_pretty(&json)?)
}

fn main() -> Result<()> {
    let args = Args::parse();
    println!("{}", run(&args.url, &args.action)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    #[test]
    fn maps_actions_to_routes() {
        assert_eq!(route(&Action::Status).unwrap(), (Method::GET, "/status".to_string()));
        assert_eq!(route(&Action::Disable).unwrap(), (Method::POST, "/disable".to_string()));
        assert_eq!(route(&Action::Resume).unwrap(), (Method::DELETE, "/override".to_string()));
        assert_eq!(
            route(&Action::Set { value: "71.5".to_string() }).unwrap(),
            (Method::POST, "/set_desired_temp/71.5".to_string())
        );
    }

    #[test]
    fn rejects_bad_setpoint_before_sending() {
        assert!(route(&Action::Set { value: "hot".to_string() }).is_err());
        assert!(route(&Action::Set { value: "NaN".to_string() }).is_err());
    }

    #[test]
    fn parses_command_line() {
        let args = Args::parse_from(["heater-ctl", "--url", "http://pi:5000", "set", "70"]);
        assert_eq!(args.url, "http://pi:5000");
        assert_eq!(args.action, Action::Set { value: "70".to_string() });
    }

    #[test]
    fn accepts_negative_setpoint() {
        let args = Args::parse_from(["heater-ctl", "set", "-5"]);
        assert_eq!(args.action, Action::Set { value: "-5".to_string() });
        assert_eq!(
            route(&args.action).unwrap(),
            (Method::POST, "/set_desired_temp/-5".to_string())
        );
    }

    #[test]
    fn prints_status() {
        let mut server = Server::new();
        let mock = server
            .mock("POST", "/enable")
            .with_status(200)
            .with_body(r#"{"enabled":true,"heater_on":false}"#)
            .create();

        let out = run(&server.url(), &Action::Enable).unwrap();
        assert!(out.contains("\"enabled\": true"));
        mock.assert();
    }

    #[test]
    fn server_error_is_reported() {
        let mut server = Server::new();
        let _mock = server
            .mock("POST", "/set_desired_temp/70")
            .with_status(406)
            .with_body(r#"{"error":"invalid setpoint","code":"INVALID_SETPOINT"}"#)
            .create();

        let err = run(&server.url(), &Action::Set { value: "70".to_string() }).unwrap_err();
        assert!(err.to_string().contains("406"));
    }
}
