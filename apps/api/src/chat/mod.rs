// Chat endpoints: thin HTTP wrappers over llm_client::Agent.

pub mod handlers;
