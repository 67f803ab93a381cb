pub mod server;
pub mod session;

// Internal "interpreter" for `Action`, keeps the match out of this module.
mod run;

#[derive(Debug)]
pub enum Action {
    Server(server::Args),
    Session(session::Args),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}
