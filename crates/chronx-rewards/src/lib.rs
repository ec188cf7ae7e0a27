pub mod epoch;
pub mod router;
pub mod split;

pub use epoch::{build_epoch_rewards, eligible_validators, is_epoch_boundary};
pub use router::RewardRouter;
pub use split::{apply_fee_split, primary_destination, split_fee, FeeSplit};
