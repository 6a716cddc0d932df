pub mod corpus;
pub mod markov;
pub mod pipeline;
pub mod sampler;
pub mod vocabulary;
