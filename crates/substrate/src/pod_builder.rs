//! Translate a task spec to a worker-pod description (§4.5).

use hortator_core::{constants, validate_quantity, InvalidQuantity, Task, Tier};
use k8s_openapi::api::core::v1::{
    Container, EmptyDirVolumeSource, EnvVar, EnvVarSource, PersistentVolumeClaimVolumeSource,
    Pod, PodSpec, ResourceRequirements, SecretKeySelector, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PodBuilderError {
    #[error("invalid resource quantity: {0}")]
    InvalidQuantity(#[from] InvalidQuantity),
}

/// Resolved-from-cluster-defaults inputs the builder needs but does not own
/// (§4.2, §4.5). The defaults cache lives in the engine crate; this struct is
/// the seam between the two.
#[derive(Debug, Clone)]
pub struct PodDefaults {
    pub basic_image: String,
    pub agentic_image: String,
    pub default_cpu_request: String,
    pub default_cpu_limit: String,
    pub default_memory_request: String,
    pub default_memory_limit: String,
    /// Comma-joined allowlist/denylist projected from aggregated policies (§4.5).
    pub allowed_shell_commands: Option<String>,
    pub denied_shell_commands: Option<String>,
    pub read_only_workspace: bool,
}

/// Build the worker pod for a task, owned by the task's `Task` object.
pub fn build_worker_pod(
    task: &Task,
    namespace: &str,
    defaults: &PodDefaults,
) -> Result<Pod, PodBuilderError> {
    let name = task.metadata.name.clone().unwrap_or_default();
    let spec = &task.spec;
    let effective_caps = hortator_core::effective_capabilities(spec.tier, &spec.capabilities);
    let agentic = spec.tier.is_agentic();

    let image = spec.image.clone().unwrap_or_else(|| {
        if agentic {
            defaults.agentic_image.clone()
        } else {
            defaults.basic_image.clone()
        }
    });

    let resources = build_resources(task, defaults)?;
    let service_account = if effective_caps.contains(hortator_core::SPAWN) {
        constants::SERVICE_ACCOUNT_SPAWN
    } else {
        constants::SERVICE_ACCOUNT_BASIC
    }
    .to_string();

    let storage_name = constants::storage_name(&name);
    let mut volumes = vec![Volume {
        name: "workspace".to_string(),
        persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
            claim_name: storage_name.clone(),
            read_only: Some(false),
        }),
        ..Default::default()
    }];

    let mut mounts = vec![
        VolumeMount {
            name: "workspace".to_string(),
            mount_path: constants::MOUNT_OUTBOX.to_string(),
            sub_path: Some("outbox".to_string()),
            ..Default::default()
        },
        VolumeMount {
            name: "workspace".to_string(),
            mount_path: constants::MOUNT_WORKSPACE.to_string(),
            sub_path: Some("workspace".to_string()),
            ..Default::default()
        },
        VolumeMount {
            name: "workspace".to_string(),
            mount_path: constants::MOUNT_MEMORY.to_string(),
            sub_path: Some("memory".to_string()),
            ..Default::default()
        },
    ];

    // Agentic tiers need /inbox to persist across reincarnation (a PVC
    // subpath); the basic tier gets an ephemeral inbox (§4.5, §4.12).
    if agentic {
        volumes.push(Volume {
            name: "inbox".to_string(),
            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                claim_name: storage_name.clone(),
                read_only: Some(false),
            }),
            ..Default::default()
        });
        mounts.push(VolumeMount {
            name: "inbox".to_string(),
            mount_path: constants::MOUNT_INBOX.to_string(),
            sub_path: Some("inbox".to_string()),
            ..Default::default()
        });
    } else {
        volumes.push(Volume {
            name: "inbox".to_string(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Default::default()
        });
        mounts.push(VolumeMount {
            name: "inbox".to_string(),
            mount_path: constants::MOUNT_INBOX.to_string(),
            ..Default::default()
        });
    }

    let task_json = serde_json::to_string(&spec).unwrap_or_default();

    let mut env = vec![
        EnvVar {
            name: "HORTATOR_TASK_NAME".to_string(),
            value: Some(name.clone()),
            ..Default::default()
        },
        EnvVar {
            name: "HORTATOR_NAMESPACE".to_string(),
            value: Some(namespace.to_string()),
            ..Default::default()
        },
        EnvVar {
            name: "HORTATOR_TIER".to_string(),
            value: Some(spec.tier.to_string()),
            ..Default::default()
        },
        EnvVar {
            name: "HORTATOR_PROMPT".to_string(),
            value: Some(spec.prompt.clone()),
            ..Default::default()
        },
        EnvVar {
            name: "HORTATOR_CAPABILITIES".to_string(),
            value: Some(effective_caps.into_iter().collect::<Vec<_>>().join(",")),
            ..Default::default()
        },
        // Carried by the init container, not shell-interpolated (§4.5).
        EnvVar {
            name: "HORTATOR_TASK_JSON".to_string(),
            value: Some(task_json),
            ..Default::default()
        },
    ];
    if let Some(role) = &spec.role {
        env.push(EnvVar {
            name: "HORTATOR_ROLE".to_string(),
            value: Some(role.clone()),
            ..Default::default()
        });
    }
    if let Some(model) = &spec.model {
        env.push(EnvVar {
            name: "HORTATOR_MODEL".to_string(),
            value: Some(model.name.clone()),
            ..Default::default()
        });
        if let Some(secret) = &model.secret_ref {
            let key_name = infer_api_key_env_name(model.endpoint.as_deref());
            env.push(EnvVar {
                name: key_name,
                value_from: Some(EnvVarSource {
                    secret_key_ref: Some(SecretKeySelector {
                        name: secret.clone(),
                        key: "api-key".to_string(),
                        optional: Some(false),
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            });
        }
    }
    if let Some(cmds) = &defaults.allowed_shell_commands {
        env.push(EnvVar {
            name: "HORTATOR_ALLOWED_SHELL_COMMANDS".to_string(),
            value: Some(cmds.clone()),
            ..Default::default()
        });
    }
    if let Some(cmds) = &defaults.denied_shell_commands {
        env.push(EnvVar {
            name: "HORTATOR_DENIED_SHELL_COMMANDS".to_string(),
            value: Some(cmds.clone()),
            ..Default::default()
        });
    }
    env.push(EnvVar {
        name: "HORTATOR_READ_ONLY_WORKSPACE".to_string(),
        value: Some(defaults.read_only_workspace.to_string()),
        ..Default::default()
    });
    for extra in &spec.env {
        if let Some(value) = &extra.value {
            env.push(EnvVar {
                name: extra.name.clone(),
                value: Some(value.clone()),
                ..Default::default()
            });
        } else if let (Some(secret_name), Some(secret_key)) = (&extra.secret_name, &extra.secret_key) {
            env.push(EnvVar {
                name: extra.name.clone(),
                value_from: Some(EnvVarSource {
                    secret_key_ref: Some(SecretKeySelector {
                        name: secret_name.clone(),
                        key: secret_key.clone(),
                        optional: Some(true),
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            });
        }
    }

    let init_container = Container {
        name: "deliver-task".to_string(),
        image: Some(image.clone()),
        command: Some(vec![
            "/bin/sh".to_string(),
            "-c".to_string(),
            format!(
                "printf '%s' \"$HORTATOR_TASK_JSON\" > /inbox/{}",
                constants::TASK_JSON_FILENAME
            ),
        ]),
        env: Some(vec![env
            .iter()
            .find(|e| e.name == "HORTATOR_TASK_JSON")
            .cloned()
            .unwrap_or_default()]),
        volume_mounts: Some(vec![VolumeMount {
            name: "inbox".to_string(),
            mount_path: constants::MOUNT_INBOX.to_string(),
            sub_path: if agentic { Some("inbox".to_string()) } else { None },
            ..Default::default()
        }]),
        ..Default::default()
    };

    let worker_container = Container {
        name: "worker".to_string(),
        image: Some(image),
        env: Some(env),
        resources: Some(resources),
        volume_mounts: Some(mounts),
        ..Default::default()
    };

    let owner_ref = OwnerReference {
        api_version: "hortator.io/v1alpha1".to_string(),
        kind: "Task".to_string(),
        name: name.clone(),
        uid: task.metadata.uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    };

    let mut labels = BTreeMap::new();
    labels.insert("hortator.io/task".to_string(), name.clone());
    labels.insert("hortator.io/tier".to_string(), spec.tier.to_string());

    Ok(Pod {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: Some(namespace.to_string()),
            labels: Some(labels),
            owner_references: Some(vec![owner_ref]),
            ..Default::default()
        },
        spec: Some(PodSpec {
            init_containers: Some(vec![init_container]),
            containers: vec![worker_container],
            volumes: Some(volumes),
            service_account_name: Some(service_account),
            restart_policy: Some("Never".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    })
}

/// Build the one-shot writer pod that delivers a terminated child's result
/// into its parent's PVC at `/inbox/child-results/<child>.json` (§4.12). The
/// pod is owned by the parent, mounts the parent's workspace PVC, and writes
/// `payload_json` without shell-interpolating it (carried via env var, same
/// as the task-delivery init container).
pub fn build_writer_pod(
    parent: &Task,
    namespace: &str,
    writer_pod_name: &str,
    child_result_path: &str,
    payload_json: &str,
    image: &str,
) -> Pod {
    let parent_name = parent.metadata.name.clone().unwrap_or_default();
    let storage_name = constants::storage_name(&parent_name);

    let owner_ref = OwnerReference {
        api_version: "hortator.io/v1alpha1".to_string(),
        kind: "Task".to_string(),
        name: parent_name.clone(),
        uid: parent.metadata.uid.clone().unwrap_or_default(),
        controller: Some(false),
        block_owner_deletion: Some(true),
    };

    let container = Container {
        name: "write-child-result".to_string(),
        image: Some(image.to_string()),
        command: Some(vec![
            "/bin/sh".to_string(),
            "-c".to_string(),
            format!("mkdir -p \"$(dirname /inbox/{child_result_path})\" && printf '%s' \"$CHILD_RESULT_JSON\" > /inbox/{child_result_path}"),
        ]),
        env: Some(vec![EnvVar {
            name: "CHILD_RESULT_JSON".to_string(),
            value: Some(payload_json.to_string()),
            ..Default::default()
        }]),
        volume_mounts: Some(vec![VolumeMount {
            name: "inbox".to_string(),
            mount_path: constants::MOUNT_INBOX.to_string(),
            sub_path: Some("inbox".to_string()),
            ..Default::default()
        }]),
        ..Default::default()
    };

    Pod {
        metadata: ObjectMeta {
            name: Some(writer_pod_name.to_string()),
            namespace: Some(namespace.to_string()),
            owner_references: Some(vec![owner_ref]),
            ..Default::default()
        },
        spec: Some(PodSpec {
            containers: vec![container],
            volumes: Some(vec![Volume {
                name: "inbox".to_string(),
                persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                    claim_name: storage_name,
                    read_only: Some(false),
                }),
                ..Default::default()
            }]),
            restart_policy: Some("Never".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Build a pre-started idle worker pod for the warm pool (§4.9). Runs the
/// agentic image (a superset that can run both tier runtimes) and waits on
/// `/inbox/task.json`, dispatching to the appropriate runtime based on the
/// `tier` field inside it once the claim path delivers it.
pub fn build_warm_pod(pod_name: &str, namespace: &str, defaults: &PodDefaults) -> Pod {
    let storage_name = constants::storage_name(pod_name);
    let wait_loop = format!(
        "until [ -f /inbox/{filename} ]; do sleep 1; done; exec /usr/local/bin/hortator-agentic-entrypoint",
        filename = constants::TASK_JSON_FILENAME
    );

    let container = Container {
        name: "worker".to_string(),
        image: Some(defaults.agentic_image.clone()),
        command: Some(vec!["/bin/sh".to_string(), "-c".to_string(), wait_loop]),
        env: Some(vec![
            EnvVar {
                name: "ANTHROPIC_API_KEY".to_string(),
                value_from: Some(EnvVarSource {
                    secret_key_ref: Some(SecretKeySelector {
                        name: "hortator-model-secret".to_string(),
                        key: "api-key".to_string(),
                        optional: Some(true),
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            },
            EnvVar {
                name: "OPENAI_API_KEY".to_string(),
                value_from: Some(EnvVarSource {
                    secret_key_ref: Some(SecretKeySelector {
                        name: "hortator-model-secret".to_string(),
                        key: "api-key".to_string(),
                        optional: Some(true),
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            },
        ]),
        volume_mounts: Some(vec![
            VolumeMount {
                name: "workspace".to_string(),
                mount_path: constants::MOUNT_OUTBOX.to_string(),
                sub_path: Some("outbox".to_string()),
                ..Default::default()
            },
            VolumeMount {
                name: "workspace".to_string(),
                mount_path: constants::MOUNT_WORKSPACE.to_string(),
                sub_path: Some("workspace".to_string()),
                ..Default::default()
            },
            VolumeMount {
                name: "workspace".to_string(),
                mount_path: constants::MOUNT_MEMORY.to_string(),
                sub_path: Some("memory".to_string()),
                ..Default::default()
            },
            VolumeMount {
                name: "workspace".to_string(),
                mount_path: constants::MOUNT_INBOX.to_string(),
                sub_path: Some("inbox".to_string()),
                ..Default::default()
            },
        ]),
        ..Default::default()
    };

    let mut labels = BTreeMap::new();
    labels.insert(constants::LABEL_WARM_POOL.to_string(), "true".to_string());
    labels.insert(constants::LABEL_WARM_STATUS.to_string(), constants::WARM_STATUS_IDLE.to_string());

    Pod {
        metadata: ObjectMeta {
            name: Some(pod_name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels),
            ..Default::default()
        },
        spec: Some(PodSpec {
            containers: vec![container],
            volumes: Some(vec![Volume {
                name: "workspace".to_string(),
                persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                    claim_name: storage_name,
                    read_only: Some(false),
                }),
                ..Default::default()
            }]),
            service_account_name: Some(constants::SERVICE_ACCOUNT_SPAWN.to_string()),
            restart_policy: Some("Never".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn build_resources(task: &Task, defaults: &PodDefaults) -> Result<ResourceRequirements, PodBuilderError> {
    let r = &task.spec.resources;
    let cpu_request = r.cpu_request.clone().unwrap_or_else(|| defaults.default_cpu_request.clone());
    let cpu_limit = r.cpu_limit.clone().unwrap_or_else(|| defaults.default_cpu_limit.clone());
    let memory_request = r
        .memory_request
        .clone()
        .unwrap_or_else(|| defaults.default_memory_request.clone());
    let memory_limit = r
        .memory_limit
        .clone()
        .unwrap_or_else(|| defaults.default_memory_limit.clone());

    for quantity in [&cpu_request, &cpu_limit, &memory_request, &memory_limit] {
        validate_quantity(quantity)?;
    }

    let mut requests = BTreeMap::new();
    requests.insert("cpu".to_string(), Quantity(cpu_request));
    requests.insert("memory".to_string(), Quantity(memory_request));
    let mut limits = BTreeMap::new();
    limits.insert("cpu".to_string(), Quantity(cpu_limit));
    limits.insert("memory".to_string(), Quantity(memory_limit));

    Ok(ResourceRequirements {
        requests: Some(requests),
        limits: Some(limits),
        ..Default::default()
    })
}

/// Infer the LLM API-key environment variable name from a model endpoint
/// (§4.5): `ANTHROPIC_*`, `OPENAI_*`, else a generic fallback.
fn infer_api_key_env_name(endpoint: Option<&str>) -> String {
    match endpoint {
        Some(url) if url.contains("anthropic") => "ANTHROPIC_API_KEY".to_string(),
        Some(url) if url.contains("openai") => "OPENAI_API_KEY".to_string(),
        _ => "HORTATOR_MODEL_API_KEY".to_string(),
    }
}

#[cfg(test)]
#[path = "pod_builder_tests.rs"]
mod tests;
