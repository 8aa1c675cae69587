use crate::state::StateWrap;
use ipc_abi::{GuestMemory, IoctlvRequest, IpcReply, OpenRequest};

/// HLE device reachable from the guest through the kernel.
///
/// Requests are dispatched from a single guest-request context, so handlers
/// take `&mut self`. Devices that share state with background work keep that
/// state behind their own synchronisation.
pub trait Device: Send {
    /// Path the device is registered under, e.g. `/dev/es`.
    fn name(&self) -> &str;

    fn is_opened(&self) -> bool;

    fn open(&mut self, request: &OpenRequest) -> IpcReply;

    fn close(&mut self) -> IpcReply;

    /// Handles a vectored request. `None` defers the reply.
    fn ioctlv(
        &mut self,
        request: &IoctlvRequest,
        memory: &mut dyn GuestMemory,
    ) -> Option<IpcReply>;

    /// Saves or restores device state. The kernel has already handled the
    /// opened flag.
    fn do_state(&mut self, _p: &mut StateWrap) {}

    /// Called after the determinism flag changed.
    fn update_want_determinism(&mut self, _new_want_determinism: bool) {}

    /// Restores the opened flag during a state load.
    fn set_opened(&mut self, opened: bool);
}
