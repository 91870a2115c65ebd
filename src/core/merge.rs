use crate::domain::model::ResolvedListener;

/// 合併相同 (socket-binding-group, name) 的 listener
///
/// Output keeps the order of first occurrence. Ports that differ are kept side by side, equal
/// ports are not repeated. A listener is verified if any collapsed entry was.
pub fn merge(listeners: impl IntoIterator<Item = ResolvedListener>) -> Vec<ResolvedListener> {
    let mut merged: Vec<ResolvedListener> = Vec::new();

    for listener in listeners {
        let existing = merged.iter_mut().find(|m| {
            m.socket_binding_group == listener.socket_binding_group && m.name == listener.name
        });

        match existing {
            Some(entry) => {
                entry.port.absorb(&listener.port);
                entry.verified |= listener.verified;
                if entry.interface.is_none() {
                    entry.interface = listener.interface;
                }
                if entry.address.is_none() {
                    entry.address = listener.address;
                }
            }
            None => merged.push(listener),
        }
    }

    merged
}
