use crate::properties::{AuthenticationPolicyKind, CasProperties, CryptoProperties, ThrottleKind};
use cas_core::{Error, Result};

pub(crate) fn validate(properties: &CasProperties) -> Result<()> {
    let ticket = &properties.ticket;

    let tgt = &ticket.tgt;
    if tgt.max_time_to_live_in_seconds > 0
        && tgt.time_to_kill_in_seconds > tgt.max_time_to_live_in_seconds
    {
        return Err(Error::configuration(format!(
            "ticket-granting ticket time to kill ({}s) exceeds its maximum time to live ({}s)",
            tgt.time_to_kill_in_seconds, tgt.max_time_to_live_in_seconds
        )));
    }

    if ticket.st.number_of_uses == 0 {
        return Err(Error::configuration("service tickets need at least one use"));
    }
    if ticket.pt.number_of_uses == 0 {
        return Err(Error::configuration("proxy tickets need at least one use"));
    }

    for (kind, length) in [
        ("ticket-granting", tgt.max_length),
        ("service", ticket.st.max_length),
        ("proxy", ticket.pt.max_length),
        ("proxy-granting", ticket.pgt.max_length),
    ] {
        if length == 0 {
            return Err(Error::configuration(format!(
                "{kind} ticket id length must be positive"
            )));
        }
    }

    let registry = &ticket.registry;
    if registry.cache.capacity == 0 {
        return Err(Error::configuration("ticket cache capacity must be positive"));
    }
    if registry.cleaner.enabled && registry.cleaner.repeat_interval_in_seconds == 0 {
        return Err(Error::configuration(
            "registry cleaner repeat interval must be positive when the cleaner is enabled",
        ));
    }
    validate_crypto(&registry.crypto)?;

    let throttle = &properties.authn.throttle;
    if throttle.kind != ThrottleKind::None {
        if throttle.failure.threshold == 0 || throttle.failure.range_seconds == 0 {
            return Err(Error::configuration(
                "throttling requires a positive failure threshold and range",
            ));
        }
    }

    let policy = &properties.authn.policy;
    if policy.kind == AuthenticationPolicyKind::RequiredHandler
        && policy.required_handler_name.as_deref().map_or(true, str::is_empty)
    {
        return Err(Error::configuration(
            "the required-handler authentication policy needs a handler name",
        ));
    }

    if properties.authn.surrogate.separator.is_empty() {
        return Err(Error::configuration("surrogate separator cannot be empty"));
    }

    Ok(())
}

fn validate_crypto(crypto: &CryptoProperties) -> Result<()> {
    for (name, key) in [
        ("encryption", &crypto.encryption_key),
        ("signing", &crypto.signing_key),
    ] {
        let Some(key) = key else { continue };
        let bytes = hex::decode(key).map_err(|e| {
            Error::configuration(format!("ticket {name} key is not valid hex: {e}"))
        })?;
        if bytes.len() != 32 {
            return Err(Error::configuration(format!(
                "ticket {name} key must be 32 bytes, got {}",
                bytes.len()
            )));
        }
    }
    Ok(())
}
