//! Argument lists for `rosa` sub-commands.

use crate::api::OidcConfigRequest;
use crate::request::ClusterSpec;

const AUTO: [&str; 3] = ["--mode", "auto", "--yes"];

fn owned(args: &[&str]) -> Vec<String> {
    args.iter().map(ToString::to_string).collect()
}

pub(crate) fn version() -> Vec<String> {
    owned(&["version"])
}

pub(crate) fn login(token: &str, environment_url: &str) -> Vec<String> {
    owned(&["login", "--token", token, "--env", environment_url])
}

pub(crate) fn list_account_roles() -> Vec<String> {
    owned(&["list", "account-roles", "--output", "json"])
}

pub(crate) fn create_account_roles(
    prefix: &str,
    version: &str,
    channel_group: &str,
) -> Vec<String> {
    let mut args = owned(&[
        "create",
        "account-roles",
        "--prefix",
        prefix,
        "--version",
        version,
        "--channel-group",
        channel_group,
    ]);
    args.extend(owned(&AUTO));
    args
}

pub(crate) fn delete_account_roles(prefix: &str) -> Vec<String> {
    let mut args = owned(&["delete", "account-roles", "--prefix", prefix]);
    args.extend(owned(&AUTO));
    args
}

pub(crate) fn create_oidc_config(request: &OidcConfigRequest) -> Vec<String> {
    let mut args = owned(&["create", "oidc-config", "--output", "json"]);
    args.extend(owned(&AUTO));
    args.push(format!("--managed={}", request.managed));
    args.extend(owned(&[
        "--installer-role-arn",
        &request.installer_role_arn,
        "--prefix",
        &request.prefix,
    ]));
    args
}

pub(crate) fn delete_oidc_config(id: &str) -> Vec<String> {
    owned(&[
        "delete",
        "oidc-config",
        "--mode",
        "auto",
        "--oidc-config-id",
        id,
        "--yes",
    ])
}

pub(crate) fn delete_oidc_provider(cluster_id: &str) -> Vec<String> {
    let mut args = owned(&["delete", "oidc-provider", "--cluster", cluster_id]);
    args.extend(owned(&AUTO));
    args
}

pub(crate) fn delete_operator_roles(cluster_id: &str) -> Vec<String> {
    let mut args = owned(&["delete", "operator-roles", "--cluster", cluster_id]);
    args.extend(owned(&AUTO));
    args
}

/// `rosa create cluster` arguments. Flag order is stable.
pub(crate) fn create_cluster(spec: &ClusterSpec, region: &str) -> Vec<String> {
    let replicas = spec.replicas.to_string();
    let mut args = owned(&["create", "cluster", "--output", "json"]);
    args.extend(owned(&AUTO));
    args.extend(owned(&[
        "--cluster-name",
        &spec.name,
        "--channel-group",
        &spec.channel_group,
        "--compute-machine-type",
        &spec.compute_machine_type,
        "--machine-cidr",
        &spec.machine_cidr,
        "--region",
        region,
        "--version",
        &spec.version,
        "--replicas",
        &replicas,
        "--properties",
        &spec.properties,
        "--controlplane-iam-role",
        &spec.account_roles.control_plane,
        "--role-arn",
        &spec.account_roles.installer,
        "--support-role-arn",
        &spec.account_roles.support,
        "--worker-iam-role",
        &spec.account_roles.worker,
    ]));

    if let Some(hosted) = &spec.hosted {
        let subnets = hosted.subnet_ids.join(",");
        args.extend(owned(&[
            "--hosted-cp",
            "--oidc-config-id",
            &hosted.oidc_config_id,
            "--subnet-ids",
            &subnets,
        ]));
    }

    if spec.sts {
        args.push("--sts".to_string());
    }

    args
}

pub(crate) fn describe_cluster(cluster_id: &str) -> Vec<String> {
    owned(&["describe", "cluster", "--cluster", cluster_id, "--output", "json"])
}

pub(crate) fn delete_cluster(cluster_id: &str) -> Vec<String> {
    owned(&["delete", "cluster", "--cluster", cluster_id, "--yes"])
}
