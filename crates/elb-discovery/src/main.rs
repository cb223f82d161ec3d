//! elb-discovery - prints the address of healthy instances behind a
//! classic AWS load balancer.
//!
//! Designed for scripting: the result goes to stdout, diagnostics go to
//! stderr, and the exit code distinguishes bad input (6) and AWS API
//! failures (5) from general errors (1).

use anyhow::{Context, Result};
use aws_credential_types::provider::ProvideCredentials;
use clap::Parser;
use std::process::exit;
use tracing::{debug, error};

const EXIT_GENERAL: i32 = 1;
const EXIT_API_FAILURE: i32 = 5;
const EXIT_BAD_INPUT: i32 = 6;

const HEALTHY_STATE: &str = "InService";

/// Return the IP address of one or more healthy instances behind a load balancer.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// AWS region to query
    #[arg(short, long, env = "AWS_REGION", default_value = "us-east-1")]
    region: String,

    /// Name of the ELB to query
    #[arg(long, default_value = "")]
    load_balancer_name: String,

    /// Number of results to return. 0 returns all. Any number that is
    /// *not* 1 returns a JSON array.
    #[arg(long, default_value_t = 1)]
    count: usize,

    /// Only return private IP addresses
    #[arg(long)]
    private_ip_only: bool,

    /// Verbose: turn on debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(args.debug);

    if let Err(message) = validate(&args) {
        error!(error = %message, "invalid arguments");
        exit(EXIT_BAD_INPUT);
    }
    debug!("arguments valid");

    let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(args.region.clone()))
        .load()
        .await;

    // Die early if no credential source resolves; every later call would
    // fail with a less useful message.
    if let Err(error) = verify_credentials(&config).await {
        error!(error = %error, "credentials");
        exit(EXIT_GENERAL);
    }
    debug!("credentials valid");

    let elb = aws_sdk_elasticloadbalancing::Client::new(&config);
    let ec2 = aws_sdk_ec2::Client::new(&config);

    let instances = healthy_instances(&elb, &args.load_balancer_name)
        .await
        .unwrap_or_else(|error| {
            error!(error = %error, "DescribeInstanceHealth");
            exit(EXIT_API_FAILURE);
        });
    if instances.is_empty() {
        error!("no healthy instances available in the ELB");
        exit(EXIT_API_FAILURE);
    }
    debug!(healthy = instances.len(), "instances available");

    let ips = fetch_ips(&ec2, &instances, args.count, args.private_ip_only).await;
    if ips.is_empty() {
        error!("no healthy instances answered with an address");
        exit(EXIT_API_FAILURE);
    }

    let rendered = render(&ips, args.count).unwrap_or_else(|error| {
        error!(error = %error, "encoding results");
        exit(EXIT_GENERAL);
    });
    println!("{rendered}");
}

fn init_tracing(debug: bool) {
    let default_filter = if debug { "elb_discovery=debug,info" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn validate(args: &Args) -> Result<(), String> {
    if args.region.is_empty() {
        return Err("region cannot be empty".to_string());
    }
    debug!(region = %args.region);

    if args.load_balancer_name.is_empty() {
        return Err("load-balancer-name cannot be empty".to_string());
    }
    debug!(load_balancer_name = %args.load_balancer_name);

    debug!(count = args.count);
    debug!(private_ip_only = args.private_ip_only);
    Ok(())
}

async fn verify_credentials(config: &aws_config::SdkConfig) -> Result<()> {
    let provider = config
        .credentials_provider()
        .context("no credentials provider configured")?;
    provider
        .provide_credentials()
        .await
        .context("could not resolve AWS credentials")?;
    Ok(())
}

/// IDs of every instance the load balancer reports as `InService`.
async fn healthy_instances(
    elb: &aws_sdk_elasticloadbalancing::Client,
    name: &str,
) -> Result<Vec<String>> {
    let health = elb
        .describe_instance_health()
        .load_balancer_name(name)
        .send()
        .await
        .with_context(|| format!("DescribeInstanceHealth failed for {name:?}"))?;

    Ok(health
        .instance_states()
        .iter()
        .filter(|state| state.state() == Some(HEALTHY_STATE))
        .filter_map(|state| state.instance_id().map(str::to_string))
        .collect())
}

/// Walk the healthy instances in order until `count` addresses are found.
///
/// An instance that fails to describe or has no address of the requested
/// kind is skipped without counting against `count`, so later instances
/// can still fill the quota.
async fn fetch_ips(
    ec2: &aws_sdk_ec2::Client,
    instance_ids: &[String],
    count: usize,
    private_only: bool,
) -> Vec<String> {
    let wanted = quota(count, instance_ids.len());
    let mut ips = Vec::with_capacity(wanted);

    for instance_id in instance_ids {
        if ips.len() == wanted {
            break;
        }
        match instance_ip(ec2, instance_id, private_only).await {
            Ok(ip) => ips.push(ip),
            Err(error) => {
                debug!(instance_id = %instance_id, error = %error, "skipping instance");
            }
        }
    }

    ips
}

/// How many addresses to collect: `0` means all, and asking for more than
/// exist caps at what is available.
fn quota(count: usize, available: usize) -> usize {
    if count == 0 || count > available {
        available
    } else {
        count
    }
}

async fn instance_ip(
    ec2: &aws_sdk_ec2::Client,
    instance_id: &str,
    private_only: bool,
) -> Result<String> {
    let described = ec2
        .describe_instances()
        .instance_ids(instance_id)
        .send()
        .await
        .with_context(|| format!("DescribeInstances failed for {instance_id}"))?;

    let instance = described
        .reservations()
        .first()
        .and_then(|reservation| reservation.instances().first())
        .with_context(|| format!("instance {instance_id} not in the response"))?;

    let ip = if private_only {
        instance.private_ip_address()
    } else {
        instance.public_ip_address()
    };
    ip.map(str::to_string)
        .with_context(|| format!("instance {instance_id} has no address"))
}

/// One bare address when exactly one was requested, a JSON array otherwise.
fn render(ips: &[String], count: usize) -> Result<String> {
    if count == 1 && ips.len() == 1 {
        Ok(ips[0].clone())
    } else {
        serde_json::to_string(ips).context("could not encode address list")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_defaults() {
        // The region flag also reads AWS_REGION, which may leak in from the
        // host running the tests.
        std::env::remove_var("AWS_REGION");
        let args = Args::try_parse_from(["elb-discovery"]).unwrap();
        assert_eq!(args.region, "us-east-1");
        assert_eq!(args.load_balancer_name, "");
        assert_eq!(args.count, 1);
        assert!(!args.private_ip_only);
        assert!(!args.debug);
    }

    #[test]
    fn args_short_region_flag() {
        let args = Args::try_parse_from(["elb-discovery", "-r", "eu-west-1"]).unwrap();
        assert_eq!(args.region, "eu-west-1");
    }

    #[test]
    fn validate_requires_load_balancer_name() {
        let args = Args::try_parse_from(["elb-discovery"]).unwrap();
        let err = validate(&args).unwrap_err();
        assert!(err.contains("load-balancer-name"));
    }

    #[test]
    fn validate_requires_region() {
        let args =
            Args::try_parse_from(["elb-discovery", "-r", "", "--load-balancer-name", "web"])
                .unwrap();
        let err = validate(&args).unwrap_err();
        assert!(err.contains("region"));
    }

    #[test]
    fn validate_accepts_complete_arguments() {
        let args =
            Args::try_parse_from(["elb-discovery", "--load-balancer-name", "web"]).unwrap();
        assert!(validate(&args).is_ok());
    }

    #[test]
    fn quota_zero_means_all() {
        assert_eq!(quota(0, 5), 5);
    }

    #[test]
    fn quota_caps_at_available() {
        assert_eq!(quota(10, 3), 3);
    }

    #[test]
    fn quota_passes_through_small_counts() {
        assert_eq!(quota(2, 5), 2);
    }

    #[test]
    fn render_single_requested_address_is_bare() {
        let ips = vec!["203.0.113.7".to_string()];
        assert_eq!(render(&ips, 1).unwrap(), "203.0.113.7");
    }

    #[test]
    fn render_multiple_addresses_is_json_array() {
        let ips = vec!["203.0.113.7".to_string(), "203.0.113.8".to_string()];
        assert_eq!(render(&ips, 2).unwrap(), r#"["203.0.113.7","203.0.113.8"]"#);
    }

    #[test]
    fn render_count_zero_is_json_even_for_one_address() {
        let ips = vec!["203.0.113.7".to_string()];
        assert_eq!(render(&ips, 0).unwrap(), r#"["203.0.113.7"]"#);
    }
}
