//! Contract bindings for the AgriHub marketplace and its ERC-20 payment token.

use alloy::sol;

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    #[derive(Debug)]
    interface AgriHubV3 {
        struct FarmerTransaction {
            uint256 timestamp;
            uint256 productId;
            string productName;
            uint256 quantity;
            uint256 sharePercentage;
            address buyer;
            uint256 totalAmount;
            uint256 shareAmount;
        }

        struct HubTransaction {
            uint256 timestamp;
            uint256 productId;
            string productName;
            uint256 quantity;
            uint256 price;
            uint256 totalAmount;
            address buyer;
            address farmer;
        }

        struct Contribution {
            address hubAddress;
            uint256 productId;
            uint256 quantity;
            uint256 price;
        }

        struct HubProduct {
            uint256 productId;
            string name;
            uint256 totalQuantity;
            uint256 weightedPrice;
            bool active;
        }

        function paymentToken() external view returns (address);

        function farmerExists(address farmer) external view returns (bool);
        function getFarmerEarnings(address farmer) external view returns (uint256);
        function getFarmerTransactionsStructured(address farmer) external view returns (FarmerTransaction[] memory);
        function getFarmerContributions(address farmer) external view returns (Contribution[] memory);

        function getAllHubs() external view returns (address[] memory);
        function getHubInfo(address hub) external view returns (string memory name, string memory location);
        function getHubProducts(address hub) external view returns (HubProduct[] memory);
        function getHubProductDetails(address hub, uint256 productId) external view returns (string memory name, uint256 totalQuantity, uint256 weightedPrice, bool active);
        function getHubTransactionsStructured(address hub) external view returns (HubTransaction[] memory);
        function getHubStatistics(address hub) external view returns (uint256 activeListings, uint256 totalTransactions, uint256 transactionVolume, uint256 pendingRequests);
        function getAllProductRequests(address fromHub, address toHub, uint256 productId) external view returns (uint256[] memory requestIndices, uint256[] memory quantities, uint8[] memory statuses);

        function getAllProducts() external view returns (uint256[] memory productIds, string[] memory productNames);
        function getProductDetails(uint256 productId) external view returns (string memory);

        function registerAsFarmer() external;
        function contributeProduct(address hubAddress, uint256 productId, uint256 quantity, uint256 price) external;
        function registerAsHub(string memory name, string memory location) external;
        function createProduct(string memory name) external;
        function addProductToHub(uint256 productId) external;
        function toggleProductStatus(uint256 productId, bool active) external;
        function requestProductFromHub(address toHub, uint256 productId, uint256 quantity) external;
        function fulfillProductRequest(address fromHub, uint256 productId, uint256 requestIndex) external;
        function denyProductRequest(address fromHub, uint256 productId, uint256 requestIndex) external;
        function purchaseProduct(address hubAddress, uint256 productId, uint256 quantity) external;
    }
}

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    #[derive(Debug)]
    interface IERC20 {
        function balanceOf(address owner) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
        function symbol() external view returns (string memory);
        function decimals() external view returns (uint8);
    }
}
